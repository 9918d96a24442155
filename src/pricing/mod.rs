//! Pricing and caching.
//!
//! `PriceStore` answers one question — what is this item worth to us — by
//! combining a durable name→`PriceBasis` cache with two independent remote
//! sources (catalog price by canonical name, player-market price by
//! name+world) and the basis-selection rule. Remote failures degrade to
//! absent data; absence of both sources is cached as a partially known
//! record so the next sweep does not hammer the services again.

pub mod catalog;
pub mod player;
pub mod registry;
pub mod report;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::types::PriceBasis;
use catalog::CatalogClient;
use player::PlayerMarketClient;
use registry::TradeRegistry;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Maximum age of a player-market observation before a cached record must
/// be refreshed remotely.
const VALIDITY_DAYS: i64 = 30;

/// The shop's own markup over its wholesale reference price. Resale through
/// the catalog pays `floor(catalog_price × SHOP_MARKUP)`.
const SHOP_MARKUP: Decimal = dec!(1.15);

// ---------------------------------------------------------------------------
// Price store
// ---------------------------------------------------------------------------

/// Resolves and caches an item's shop/player pricing.
///
/// The in-memory map is the whole store; loading and saving it across runs
/// is the storage module's concern.
pub struct PriceStore {
    catalog: Option<CatalogClient>,
    player_market: Option<PlayerMarketClient>,
    registry: TradeRegistry,
    world: String,
    entries: HashMap<String, PriceBasis>,
    validity: Duration,
    remote_lookups: u64,
    cache_hits: u64,
}

impl PriceStore {
    pub fn new(
        catalog: Option<CatalogClient>,
        player_market: Option<PlayerMarketClient>,
        registry: TradeRegistry,
        world: &str,
    ) -> Self {
        Self::with_entries(catalog, player_market, registry, world, HashMap::new())
    }

    /// Create a store preloaded with a persisted cache.
    pub fn with_entries(
        catalog: Option<CatalogClient>,
        player_market: Option<PlayerMarketClient>,
        registry: TradeRegistry,
        world: &str,
        entries: HashMap<String, PriceBasis>,
    ) -> Self {
        Self {
            catalog,
            player_market,
            registry,
            world: world.to_string(),
            entries,
            validity: Duration::days(VALIDITY_DAYS),
            remote_lookups: 0,
            cache_hits: 0,
        }
    }

    /// Override the validity window (shorter windows in tests).
    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    /// Resolve the pricing record for an item name, preferring a valid
    /// cached record over a fresh remote lookup.
    pub async fn lookup(&mut self, name: &str) -> PriceBasis {
        let now = Utc::now();

        if let Some(entry) = self.entries.get(name) {
            if self.is_fresh(entry, now) {
                self.cache_hits += 1;
                debug!(item = name, "Price cache hit");
                let mut basis = entry.clone();
                basis.from_cache = true;
                return basis;
            }
            debug!(item = name, "Cached price stale, refreshing");
        }

        self.refresh(name, now).await
    }

    /// Resale value of an item under the basis-selection rule, or `None`
    /// when no basis is available.
    pub fn resale_value(&self, name: &str, basis: &PriceBasis) -> Option<i64> {
        if self.registry.is_catalog_sellable(name) {
            if let Some(price) = basis.catalog_price {
                return (Decimal::from(price) * SHOP_MARKUP).floor().to_i64();
            }
            // Catalog-sellable but unknown to the catalog: the player
            // market is the only basis left.
            return basis.player.as_ref().map(|q| q.value);
        }
        basis.player.as_ref().map(|q| q.value)
    }

    fn is_fresh(&self, basis: &PriceBasis, now: DateTime<Utc>) -> bool {
        now - basis.observed_at() < self.validity
    }

    /// Perform the two independent remote lookups and cache the result.
    /// Missing data from either source is a valid outcome.
    async fn refresh(&mut self, name: &str, now: DateTime<Utc>) -> PriceBasis {
        let catalog_price = match &self.catalog {
            Some(client) => match client.shop_price(name).await {
                Ok(price) => price,
                Err(e) => {
                    warn!(item = name, error = %e, "Catalog lookup failed, treating as unknown");
                    None
                }
            },
            None => None,
        };

        let player = match &self.player_market {
            Some(client) => match client.latest_quote(name, &self.world).await {
                Ok(quote) => quote,
                Err(e) => {
                    warn!(item = name, error = %e, "Player-market lookup failed, treating as unknown");
                    None
                }
            },
            None => None,
        };

        let basis = PriceBasis {
            catalog_price,
            player,
            fetched_at: now,
            from_cache: false,
        };

        self.remote_lookups += 1;
        self.entries.insert(name.to_string(), basis.clone());
        basis
    }

    // -- Accessors for persistence and monitoring ------------------------

    /// Snapshot of the cache for persistence.
    pub fn export(&self) -> HashMap<String, PriceBasis> {
        self.entries.clone()
    }

    pub fn world(&self) -> &str {
        &self.world
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn remote_lookups(&self) -> u64 {
        self.remote_lookups
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    /// Cache hit rate as a fraction (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.remote_lookups + self.cache_hits;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
