//! HAGGLER — Autonomous in-game marketplace trading agent.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores the price cache from disk (or starts fresh), and runs the
//! analyze→purchase→wait routine loop with graceful shutdown.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use haggler::client::http::HttpGameClient;
use haggler::config;
use haggler::parser::ProfitPolicy;
use haggler::pricing::catalog::CatalogClient;
use haggler::pricing::player::PlayerMarketClient;
use haggler::pricing::registry::TradeRegistry;
use haggler::pricing::report::ReportClient;
use haggler::pricing::PriceStore;
use haggler::routine::TradingRoutine;
use haggler::service::TradingService;
use haggler::storage;
use haggler::telemetry::InMemoryChannel;
use haggler::types::Category;

const BANNER: &str = r#"
 _   _    _    ____  ____ _     _____ ____
| | | |  / \  / ___|/ ___| |   | ____|  _ \
| |_| | / _ \| |  _| |  _| |   |  _| | |_) |
|  _  |/ ___ \ |_| | |_| | |___| |___|  _ <
|_| |_/_/   \_\____|\____|_____|_____|_| \_\

  Autonomous Marketplace Trading Agent
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = config::AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        world = %cfg.agent.world,
        tick_interval_ms = cfg.agent.tick_interval_ms,
        telemetry_interval_ms = cfg.agent.telemetry_interval_ms,
        "HAGGLER starting up"
    );

    // -- Restore the price cache -----------------------------------------

    let cache = match storage::load_cache(Some(&cfg.persistence.cache_file))? {
        Some(entries) => {
            info!(entries = entries.len(), "Resumed price cache from disk");
            entries
        }
        None => {
            info!("Fresh price cache");
            Default::default()
        }
    };

    // -- Initialise components -------------------------------------------

    // Game client (session cookie resolved from env if configured)
    let session_cookie = cfg
        .game
        .session_cookie_env
        .as_deref()
        .and_then(|env| std::env::var(env).ok());
    if session_cookie.is_none() {
        warn!("No session cookie configured — running unauthenticated");
    }
    let client = Arc::new(HttpGameClient::new(&cfg.game.base_url, session_cookie)?);

    // Remote price services
    let catalog = if cfg.services.catalog.enabled {
        Some(CatalogClient::new(&cfg.services.catalog.base_url)?)
    } else {
        None
    };
    let player_market = if cfg.services.player_market.enabled {
        Some(PlayerMarketClient::new(&cfg.services.player_market.base_url)?)
    } else {
        None
    };
    let reporter = if cfg.services.reporting.enabled {
        Some(ReportClient::new(&cfg.services.reporting.base_url)?)
    } else {
        None
    };

    // Price store (owns the cache and the basis-selection rule)
    let registry = TradeRegistry::new(
        cfg.trading.player_tradeable.clone(),
        cfg.trading.catalog_listed.clone(),
    );
    let store = PriceStore::with_entries(catalog, player_market, registry, &cfg.agent.world, cache);

    // Acceptance policy from config
    let allowed = if cfg.trading.categories.is_empty() {
        None
    } else {
        let mut categories = Vec::new();
        for raw in &cfg.trading.categories {
            categories.push(raw.parse::<Category>()?);
        }
        Some(categories)
    };
    let policy = ProfitPolicy::new(cfg.trading.min_profit, allowed);

    // Routine and service
    let routine = TradingRoutine::new(
        client,
        store,
        Box::new(policy),
        chrono::Duration::seconds(cfg.agent.delivery_wait_secs as i64),
    );
    let channel = Arc::new(InMemoryChannel::new());
    let mut service = TradingService::new(
        routine,
        channel,
        reporter,
        chrono::Duration::milliseconds(cfg.agent.telemetry_interval_ms as i64),
    );

    // -- Main loop -------------------------------------------------------

    let mut interval = tokio::time::interval(Duration::from_millis(cfg.agent.tick_interval_ms));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        tick_interval_ms = cfg.agent.tick_interval_ms,
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                service.tick(Utc::now()).await;
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    // Save the price cache
    storage::save_cache(
        &service.routine().price_cache(),
        Some(&cfg.persistence.cache_file),
    )?;
    info!(
        stats = %service.routine().stats(),
        cache_entries = service.routine().price_cache().len(),
        "HAGGLER shut down cleanly."
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("haggler=info"));

    let json_logging = std::env::var("HAGGLER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
