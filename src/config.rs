//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (the game session cookie) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub game: GameConfig,
    pub trading: TradingConfig,
    pub services: ServicesConfig,
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
    /// Routine tick cadence (order of 100 ms).
    pub tick_interval_ms: u64,
    /// Telemetry push / signal poll cadence (order of 500 ms).
    pub telemetry_interval_ms: u64,
    /// Fallback delivery wait when no restock announcement is seen.
    pub delivery_wait_secs: u64,
    /// World identifier scoping player-market prices.
    pub world: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GameConfig {
    pub base_url: String,
    /// Env var holding the session cookie. Optional; without it the client
    /// runs unauthenticated (useful for dry scans against fixtures).
    #[serde(default)]
    pub session_cookie_env: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TradingConfig {
    /// Minimum profit in gold for an offer to be queued.
    pub min_profit: i64,
    /// Category allow-list; empty means all categories.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Items resold player-to-player instead of to the shop.
    #[serde(default)]
    pub player_tradeable: Vec<String>,
    /// Player-tradeable items that are nevertheless catalog-listed.
    #[serde(default)]
    pub catalog_listed: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServicesConfig {
    pub catalog: ServiceEndpoint,
    pub player_market: ServiceEndpoint,
    pub reporting: ServiceEndpoint,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceEndpoint {
    pub enabled: bool,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PersistenceConfig {
    pub cache_file: String,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [agent]
            name = "HAGGLER-001"
            tick_interval_ms = 100
            telemetry_interval_ms = 500
            delivery_wait_secs = 900
            world = "welt4"

            [game]
            base_url = "https://game.example"
            session_cookie_env = "HAGGLER_SESSION"

            [trading]
            min_profit = 50
            categories = ["spells", "amulets"]
            player_tradeable = ["Seelenkapsel"]
            catalog_listed = []

            [services.catalog]
            enabled = true
            base_url = "https://catalog.example/api"

            [services.player_market]
            enabled = true
            base_url = "https://market.example/api"

            [services.reporting]
            enabled = false
            base_url = "https://market.example/api"

            [persistence]
            cache_file = "haggler_prices.json"
        "#;
        let cfg: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.agent.name, "HAGGLER-001");
        assert_eq!(cfg.agent.tick_interval_ms, 100);
        assert_eq!(cfg.trading.min_profit, 50);
        assert_eq!(cfg.trading.categories.len(), 2);
        assert!(cfg.services.catalog.enabled);
        assert!(!cfg.services.reporting.enabled);
    }

    #[test]
    fn test_optional_fields_default() {
        let toml = r#"
            [agent]
            name = "HAGGLER-001"
            tick_interval_ms = 100
            telemetry_interval_ms = 500
            delivery_wait_secs = 900
            world = "welt4"

            [game]
            base_url = "https://game.example"

            [trading]
            min_profit = 0

            [services.catalog]
            enabled = false
            base_url = ""

            [services.player_market]
            enabled = false
            base_url = ""

            [services.reporting]
            enabled = false
            base_url = ""

            [persistence]
            cache_file = "cache.json"
        "#;
        let cfg: AppConfig = toml::from_str(toml).unwrap();
        assert!(cfg.game.session_cookie_env.is_none());
        assert!(cfg.trading.categories.is_empty());
        assert!(cfg.trading.player_tradeable.is_empty());
    }

    #[test]
    fn test_load_config_file() {
        // This test requires config.toml to be in the working directory.
        // If it isn't, that's acceptable in some test environments.
        if let Ok(cfg) = AppConfig::load("config.toml") {
            assert!(cfg.agent.tick_interval_ms > 0);
            assert!(cfg.agent.telemetry_interval_ms >= cfg.agent.tick_interval_ms);
        }
    }
}
