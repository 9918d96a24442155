//! Player-market price source.
//!
//! Fetches the most recent player-to-player sale price for an item, scoped
//! by world — prices differ per world, so the observation carries its world
//! identifier into the cached record.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::types::PlayerQuote;

#[derive(Debug, Deserialize)]
struct PlayerTrade {
    price: i64,
    observed_at: DateTime<Utc>,
}

pub struct PlayerMarketClient {
    http: Client,
    base_url: String,
}

impl PlayerMarketClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .user_agent("HAGGLER/0.1.0")
            .build()
            .context("Failed to build player-market HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The latest observed sale for an item on a world, or `None` if the
    /// service has never seen one.
    pub async fn latest_quote(&self, name: &str, world: &str) -> Result<Option<PlayerQuote>> {
        let url = format!(
            "{}/trades/latest?item={}&world={}",
            self.base_url,
            urlencoding::encode(name),
            urlencoding::encode(world)
        );

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Player-market request failed: {url}"))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(item = name, world, "No player-market observation");
            return Ok(None);
        }

        let trade: PlayerTrade = response
            .error_for_status()
            .with_context(|| format!("Bad status from player market: {url}"))?
            .json()
            .await
            .context("Failed to parse player-market response")?;

        debug!(item = name, world, price = trade.price, "Player price resolved");
        Ok(Some(PlayerQuote {
            value: trade.price,
            observed_at: trade.observed_at,
            world: world.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_construction() {
        let client = PlayerMarketClient::new("https://market.example/api/").unwrap();
        assert_eq!(client.base_url, "https://market.example/api");
    }
}
