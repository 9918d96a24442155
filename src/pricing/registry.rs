//! Tradeability registries backing the basis-selection rule.
//!
//! Every item is shop-sellable unless explicitly registered as
//! player-tradeable; a player-tradeable item may additionally be registered
//! as catalog-listed, in which case the shop basis applies again.

use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct TradeRegistry {
    player_tradeable: HashSet<String>,
    catalog_listed: HashSet<String>,
}

impl TradeRegistry {
    pub fn new(player_tradeable: Vec<String>, catalog_listed: Vec<String>) -> Self {
        Self {
            player_tradeable: player_tradeable.into_iter().collect(),
            catalog_listed: catalog_listed.into_iter().collect(),
        }
    }

    /// Whether resale for this item goes through the catalog (shop).
    pub fn is_catalog_sellable(&self, name: &str) -> bool {
        !self.player_tradeable.contains(name) || self.catalog_listed.contains(name)
    }

    /// Whether the item is registered as player-tradeable.
    pub fn is_player_tradeable(&self, name: &str) -> bool {
        self.player_tradeable.contains(name)
    }
}
