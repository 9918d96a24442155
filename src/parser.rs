//! Listing parser.
//!
//! Turns one category page's raw text into priced offer records. The
//! format contract is strict: the listing section must sit between the
//! category's anchor markers, and every item line must carry all four
//! fields (bold name, cost, purchase reference, embedded item id). A
//! missing delimiter pair fails the whole parse — partial records are
//! worse than no records, because they would be purchased blind.
//!
//! A missing resale basis, by contrast, only drops the single offer.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::client::anchors_for;
use crate::pricing::PriceStore;
use crate::types::{Category, Offer, TradeError};

// ---------------------------------------------------------------------------
// Format contract
// ---------------------------------------------------------------------------

/// An item entry always begins with a bold name.
const NAME_OPEN: &str = "<b>";
const NAME_CLOSE: &str = "</b>";
/// Cost sits between these two delimiters, thousands-separated with dots.
const COST_OPEN: &str = "für ";
const COST_CLOSE: &str = " Gold";
/// The purchase reference is the href of the buy link.
const REF_OPEN: &str = "href=\"";
const REF_CLOSE: &str = "\"";
/// The stable item id is embedded in the purchase reference.
const ITEM_ID_KEY: &str = "mit_item=";
/// Magical/special listings carry this suffix in the line.
const MAGICAL_MARKER: &str = "(magisch)";

/// The substring of `hay` strictly between `start` and `end`.
fn between<'a>(hay: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = hay.find(start)? + start.len();
    let len = hay[from..].find(end)?;
    Some(&hay[from..from + len])
}

// ---------------------------------------------------------------------------
// Acceptance policy
// ---------------------------------------------------------------------------

/// Decides whether a parsed, priced offer is worth queueing. Policy, not
/// parsing — swap implementations without touching the format contract.
pub trait OfferPolicy: Send + Sync {
    fn accepts(&self, offer: &Offer) -> bool;
}

/// Minimum-profit threshold with an optional category allow-list.
#[derive(Debug, Clone)]
pub struct ProfitPolicy {
    min_profit: i64,
    allowed: Option<HashSet<Category>>,
}

impl ProfitPolicy {
    pub fn new(min_profit: i64, allowed: Option<Vec<Category>>) -> Self {
        Self {
            min_profit,
            allowed: allowed.map(|cats| cats.into_iter().collect()),
        }
    }
}

impl OfferPolicy for ProfitPolicy {
    fn accepts(&self, offer: &Offer) -> bool {
        if offer.profit < self.min_profit {
            return false;
        }
        match &self.allowed {
            Some(categories) => categories.contains(&offer.category),
            None => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

pub struct ListingParser {
    line_break: regex::Regex,
}

impl ListingParser {
    pub fn new() -> Self {
        Self {
            line_break: regex::Regex::new(r"<br\s*/?>").expect("line break pattern is valid"),
        }
    }

    /// Parse one category page into accepted offers.
    ///
    /// Returns the batch for the caller to merge; offers that fail the
    /// acceptance policy or have no resale basis are dropped here.
    pub async fn parse(
        &self,
        category: Category,
        page_text: &str,
        store: &mut PriceStore,
        policy: &dyn OfferPolicy,
    ) -> Result<Vec<Offer>, TradeError> {
        let anchors = anchors_for(category);
        let section = between(page_text, anchors.section_start, anchors.section_end)
            .ok_or_else(|| TradeError::Format {
                category,
                message: "listing section anchors missing".to_string(),
            })?;

        let mut offers = Vec::new();
        let mut lines = 0usize;

        for raw_line in self.line_break.split(section) {
            let line = raw_line.trim();
            // Only item entries carry the bold-name marker; headers and
            // decoration are discarded without complaint.
            if !line.contains(NAME_OPEN) {
                continue;
            }
            lines += 1;

            match self.parse_line(category, line, store).await {
                Ok(offer) => {
                    if policy.accepts(&offer) {
                        debug!(offer = %offer, "Offer accepted");
                        offers.push(offer);
                    } else {
                        debug!(offer = %offer, "Offer rejected by policy");
                    }
                }
                Err(TradeError::PricingGap(name)) => {
                    warn!(item = %name, "No resale basis, skipping offer");
                }
                Err(e) => return Err(e),
            }
        }

        debug!(
            category = %category,
            lines,
            accepted = offers.len(),
            "Listing parsed"
        );
        Ok(offers)
    }

    /// Extract the four fields of one item line and price the offer.
    async fn parse_line(
        &self,
        category: Category,
        line: &str,
        store: &mut PriceStore,
    ) -> Result<Offer, TradeError> {
        let format_err = |message: &str| TradeError::Format {
            category,
            message: message.to_string(),
        };

        let name = between(line, NAME_OPEN, NAME_CLOSE)
            .ok_or_else(|| format_err("item line missing name markers"))?;

        // Fields after the name are extracted from the remainder so an
        // unlucky item name cannot shadow a delimiter.
        let after_name = line
            .find(NAME_CLOSE)
            .map(|pos| &line[pos + NAME_CLOSE.len()..])
            .unwrap_or("");

        let cost_raw = between(after_name, COST_OPEN, COST_CLOSE)
            .ok_or_else(|| format_err("item line missing cost delimiters"))?;
        let cost: i64 = cost_raw
            .trim()
            .replace('.', "")
            .parse()
            .map_err(|_| format_err("item cost is not a number"))?;

        let purchase_ref = between(after_name, REF_OPEN, REF_CLOSE)
            .ok_or_else(|| format_err("item line missing purchase reference"))?;

        let id_start = purchase_ref
            .find(ITEM_ID_KEY)
            .map(|pos| pos + ITEM_ID_KEY.len())
            .ok_or_else(|| format_err("purchase reference missing item id"))?;
        let id_digits: String = purchase_ref[id_start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        let item_id: u32 = id_digits
            .parse()
            .map_err(|_| format_err("item id is not a number"))?;

        let magical = line.contains(MAGICAL_MARKER);

        let basis = store.lookup(name).await;
        let resale = store
            .resale_value(name, &basis)
            .ok_or_else(|| TradeError::PricingGap(name.to_string()))?;

        Ok(Offer {
            name: name.to_string(),
            cost,
            profit: resale - cost,
            category,
            item_id,
            purchase_ref: purchase_ref.to_string(),
            magical,
            basis,
        })
    }
}

impl Default for ListingParser {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
