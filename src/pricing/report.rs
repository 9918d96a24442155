//! Purchase-event reporting.
//!
//! Pushes completed purchases (name, cost, profit, basis metadata) back to
//! the price service so future player-market observations improve. Delivery
//! is best effort: a failed report is logged and forgotten, never surfaced
//! to the routine.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::types::{BoughtItem, PriceBasis};

#[derive(Debug, Serialize)]
struct PurchaseEvent<'a> {
    name: &'a str,
    cost: i64,
    profit: i64,
    magical: bool,
    world: &'a str,
    catalog_price: Option<i64>,
    player_price: Option<i64>,
    bought_at: DateTime<Utc>,
}

pub struct ReportClient {
    http: Client,
    base_url: String,
}

impl ReportClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .user_agent("HAGGLER/0.1.0")
            .build()
            .context("Failed to build report HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Report one completed purchase together with the basis it was priced
    /// against.
    pub async fn report_purchase(
        &self,
        item: &BoughtItem,
        basis: &PriceBasis,
        world: &str,
    ) -> Result<()> {
        let event = PurchaseEvent {
            name: &item.name,
            cost: item.cost,
            profit: item.profit,
            magical: item.magical,
            world,
            catalog_price: basis.catalog_price,
            player_price: basis.player.as_ref().map(|q| q.value),
            bought_at: item.bought_at,
        };

        let url = format!("{}/purchases", self.base_url);
        self.http
            .post(&url)
            .json(&event)
            .send()
            .await
            .with_context(|| format!("Report request failed: {url}"))?
            .error_for_status()
            .context("Report rejected")?;

        debug!(item = %item.name, cost = item.cost, "Purchase reported");
        Ok(())
    }
}
