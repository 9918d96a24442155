//! Game-client boundary.
//!
//! Defines the `GameClient` trait the engine drives the game through, and
//! owns the category navigation table (menu labels and listing section
//! markers) consumed by both the listing parser and the purchase executor.
//!
//! Element-not-found and stale-page conditions are expected during play;
//! callers treat them as transient and recover at the routine level.

pub mod http;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::Category;

/// Chat line the merchant broadcasts when the stock has been replenished.
/// Watched during the delivery wait instead of relying on a blind timer.
pub const RESTOCK_ANNOUNCEMENT: &str = "Der Händler füllt seine Bestände wieder auf";

// ---------------------------------------------------------------------------
// Navigation anchors
// ---------------------------------------------------------------------------

/// Navigation strings for one listing category.
///
/// `menu_label` is the link text that opens the category menu;
/// `section_start`/`section_end` bracket the listing block inside the raw
/// page text. One table serves parser and executor alike.
#[derive(Debug, Clone, Copy)]
pub struct CategoryAnchors {
    pub menu_label: &'static str,
    pub section_start: &'static str,
    pub section_end: &'static str,
}

const ANCHOR_TABLE: &[(Category, CategoryAnchors)] = &[
    (
        Category::AttackWeapons,
        CategoryAnchors {
            menu_label: "Angriffswaffen",
            section_start: "Warenliste: Angriffswaffen",
            section_end: "Ende der Warenliste",
        },
    ),
    (
        Category::DefenseWeapons,
        CategoryAnchors {
            menu_label: "Verteidigungswaffen",
            section_start: "Warenliste: Verteidigungswaffen",
            section_end: "Ende der Warenliste",
        },
    ),
    (
        Category::Amulets,
        CategoryAnchors {
            menu_label: "Amulette",
            section_start: "Warenliste: Amulette",
            section_end: "Ende der Warenliste",
        },
    ),
    (
        Category::Spells,
        CategoryAnchors {
            menu_label: "Zauber",
            section_start: "Warenliste: Zauber",
            section_end: "Ende der Warenliste",
        },
    ),
    (
        Category::Misc,
        CategoryAnchors {
            menu_label: "Sonstiges",
            section_start: "Warenliste: Sonstiges",
            section_end: "Ende der Warenliste",
        },
    ),
];

/// The navigation anchors for a category.
pub fn anchors_for(category: Category) -> &'static CategoryAnchors {
    ANCHOR_TABLE
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, a)| a)
        .expect("anchor table covers every category")
}

// ---------------------------------------------------------------------------
// GameClient trait
// ---------------------------------------------------------------------------

/// Abstraction over the game session.
///
/// All methods are synchronous from the engine's point of view: one call,
/// one page interaction, no fan-out. Boolean returns report whether the
/// expected element was present; `Err` means the interaction itself failed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GameClient: Send + Sync {
    /// Open the merchant menu for a category. `Ok(false)` if the menu link
    /// was not present.
    async fn open_category_menu(&self, category: Category) -> Result<bool>;

    /// The raw text of the currently displayed page.
    async fn read_page_text(&self) -> Result<String>;

    /// Activate a purchase reference. `Ok(false)` if the reference is no
    /// longer present (the listing changed since it was scanned).
    async fn click_purchase_ref(&self, purchase_ref: &str) -> Result<bool>;

    /// Confirm the pending transaction. `Ok(false)` if no confirmation
    /// prompt was shown.
    async fn click_confirm(&self) -> Result<bool>;

    /// Return the client to a neutral menu state. Best effort.
    async fn exit_menu(&self) -> Result<()>;

    /// Whether the action budget supports a new market action right now.
    async fn can_act_now(&self) -> Result<bool>;

    /// Recent chat messages, oldest first.
    async fn chat_history(&self) -> Result<Vec<String>>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
