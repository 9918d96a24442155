//! Shared types for the HAGGLER agent.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that client, pricing, and engine
//! modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// The five listing categories the merchant exposes.
///
/// Analysis visits them in the order of [`Category::CYCLE`]; one full pass
/// over the cycle is a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    AttackWeapons,
    DefenseWeapons,
    Amulets,
    Spells,
    Misc,
}

impl Category {
    /// Fixed visiting order for the analyze sweep.
    pub const CYCLE: &'static [Category] = &[
        Category::AttackWeapons,
        Category::DefenseWeapons,
        Category::Amulets,
        Category::Spells,
        Category::Misc,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::AttackWeapons => write!(f, "AttackWeapons"),
            Category::DefenseWeapons => write!(f, "DefenseWeapons"),
            Category::Amulets => write!(f, "Amulets"),
            Category::Spells => write!(f, "Spells"),
            Category::Misc => write!(f, "Misc"),
        }
    }
}

/// Attempt to parse a string into a Category (case-insensitive).
impl std::str::FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "attack_weapons" | "attack" | "angriffswaffen" => Ok(Category::AttackWeapons),
            "defense_weapons" | "defense" | "verteidigungswaffen" => Ok(Category::DefenseWeapons),
            "amulets" | "amulett" | "amulette" => Ok(Category::Amulets),
            "spells" | "zauber" => Ok(Category::Spells),
            "misc" | "miscellaneous" | "sonstiges" => Ok(Category::Misc),
            _ => Err(anyhow::anyhow!("Unknown listing category: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Routine phase
// ---------------------------------------------------------------------------

/// The routine's externally observable phase. The sole driver of which
/// action a tick performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutinePhase {
    Analyze,
    Purchase,
    Wait,
    AwaitingDelivery,
}

impl fmt::Display for RoutinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutinePhase::Analyze => write!(f, "ANALYZE"),
            RoutinePhase::Purchase => write!(f, "PURCHASE"),
            RoutinePhase::Wait => write!(f, "WAIT"),
            RoutinePhase::AwaitingDelivery => write!(f, "AWAITING_DELIVERY"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pricing records
// ---------------------------------------------------------------------------

/// A player-to-player market observation for an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerQuote {
    /// Most recent sale price in gold.
    pub value: i64,
    /// When the sale was observed by the remote service.
    pub observed_at: DateTime<Utc>,
    /// World the observation belongs to.
    pub world: String,
}

/// Resolved pricing for an item name.
///
/// Either source may be absent; both absent means profit cannot be computed
/// for offers of this item, and the record is still cached as partially
/// known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBasis {
    /// Authoritative catalog (shop) price, if the catalog knows the item.
    pub catalog_price: Option<i64>,
    /// Most recent player-market observation, if any.
    pub player: Option<PlayerQuote>,
    /// When this record was fetched from the remote services.
    pub fetched_at: DateTime<Utc>,
    /// Whether the record was served from cache or a fresh remote lookup.
    #[serde(skip, default)]
    pub from_cache: bool,
}

impl PriceBasis {
    /// Whether at least one price source is known.
    pub fn has_any_price(&self) -> bool {
        self.catalog_price.is_some() || self.player.is_some()
    }

    /// The timestamp governing cache validity: the player observation when
    /// present, otherwise the fetch time of the record itself.
    pub fn observed_at(&self) -> DateTime<Utc> {
        self.player
            .as_ref()
            .map(|q| q.observed_at)
            .unwrap_or(self.fetched_at)
    }
}

impl fmt::Display for PriceBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let catalog = match self.catalog_price {
            Some(p) => format!("{p}g"),
            None => "-".to_string(),
        };
        let player = match &self.player {
            Some(q) => format!("{}g@{}", q.value, q.world),
            None => "-".to_string(),
        };
        write!(
            f,
            "catalog={catalog} player={player} cached={}",
            self.from_cache
        )
    }
}

// ---------------------------------------------------------------------------
// Offer
// ---------------------------------------------------------------------------

/// One purchasable listing: parsed, priced, and accepted.
///
/// Immutable once created; owned by the candidate queue until consumed by
/// the purchase executor.
#[derive(Debug, Clone)]
pub struct Offer {
    pub name: String,
    /// Asking cost in gold.
    pub cost: i64,
    /// `resale value − asking cost`, may be negative before filtering.
    pub profit: i64,
    pub category: Category,
    /// Stable numeric identifier embedded in the purchase reference.
    pub item_id: u32,
    /// Opaque href used to re-locate the exact listing when purchasing.
    pub purchase_ref: String,
    /// Whether the listing is flagged magical/special.
    pub magical: bool,
    /// The resolved pricing record the profit was computed from.
    pub basis: PriceBasis,
}

impl Offer {
    /// The resale value the profit was derived from.
    pub fn resale_value(&self) -> i64 {
        self.cost + self.profit
    }
}

impl fmt::Display for Offer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} cost={}g profit={}g (#{}{})",
            self.category,
            self.name,
            self.cost,
            self.profit,
            self.item_id,
            if self.magical { ", magical" } else { "" },
        )
    }
}

// ---------------------------------------------------------------------------
// Bought items
// ---------------------------------------------------------------------------

/// Telemetry record of a completed purchase, buffered until the external
/// consumer drains it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoughtItem {
    pub name: String,
    pub cost: i64,
    pub profit: i64,
    pub category: Category,
    pub magical: bool,
    pub bought_at: DateTime<Utc>,
}

impl BoughtItem {
    pub fn from_offer(offer: &Offer, bought_at: DateTime<Utc>) -> Self {
        Self {
            name: offer.name.clone(),
            cost: offer.cost,
            profit: offer.profit,
            category: offer.category,
            magical: offer.magical,
            bought_at,
        }
    }
}

impl fmt::Display for BoughtItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} for {}g (expected profit {}g)",
            self.name, self.cost, self.profit
        )
    }
}

// ---------------------------------------------------------------------------
// Session stats
// ---------------------------------------------------------------------------

/// Running totals for the current session, pushed to telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub gold_spent: i64,
    pub profit_expected: i64,
    pub items_bought: u64,
    pub purchases_failed: u64,
    pub started_at: DateTime<Utc>,
}

impl SessionStats {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            gold_spent: 0,
            profit_expected: 0,
            items_bought: 0,
            purchases_failed: 0,
            started_at,
        }
    }

    /// Record a completed purchase.
    pub fn record_purchase(&mut self, offer: &Offer) {
        self.gold_spent += offer.cost;
        self.profit_expected += offer.profit;
        self.items_bought += 1;
    }

    /// Record a purchase attempt that did not complete.
    pub fn record_failure(&mut self) {
        self.purchases_failed += 1;
    }

    /// Total purchase attempts, successful or not.
    pub fn attempts(&self) -> u64 {
        self.items_bought + self.purchases_failed
    }
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bought={} failed={} spent={}g expected_profit={}g",
            self.items_bought, self.purchases_failed, self.gold_spent, self.profit_expected,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error taxonomy for HAGGLER.
///
/// `Format` and `State` are structural: the outer service reacts by setting
/// the problem flag and holding the routine in its delivery wait. The other
/// two are expected degradations handled close to where they occur.
#[derive(Debug, thiserror::Error)]
pub enum TradeError {
    #[error("Listing format violated ({category}): {message}")]
    Format { category: Category, message: String },

    #[error("Unexpected client state: {0}")]
    State(String),

    #[error("No resale basis for item: {0}")]
    PricingGap(String),

    #[error("Remote call failed: {0}")]
    TransientIo(String),
}

impl TradeError {
    /// Whether this error indicates a structural problem (as opposed to an
    /// expected, locally handled degradation).
    pub fn is_structural(&self) -> bool {
        matches!(self, TradeError::Format { .. } | TradeError::State(_))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
