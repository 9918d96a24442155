//! Purchase executor.
//!
//! Drives the game client through one purchase: open the offer's category
//! menu, re-locate the purchase reference, activate it, confirm. A listing
//! that vanished between scan and purchase is an expected outcome and is
//! reported, not raised; unexpected UI states are structural errors. Every
//! exit path tries to leave the client in a neutral menu state.

use tracing::{info, warn};

use crate::client::{anchors_for, GameClient};
use crate::types::{Offer, TradeError};

/// Result of one purchase attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseOutcome {
    Bought,
    NotBought { reason: String },
}

impl PurchaseOutcome {
    pub fn is_bought(&self) -> bool {
        matches!(self, PurchaseOutcome::Bought)
    }
}

#[derive(Debug, Default)]
pub struct PurchaseExecutor;

impl PurchaseExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Execute one purchase attempt for an offer.
    pub async fn purchase(
        &self,
        client: &dyn GameClient,
        offer: &Offer,
    ) -> Result<PurchaseOutcome, TradeError> {
        let anchors = anchors_for(offer.category);

        // 1. Open the category menu.
        let opened = match client.open_category_menu(offer.category).await {
            Ok(opened) => opened,
            Err(e) => {
                self.leave_menu(client).await;
                return Err(TradeError::State(format!(
                    "category menu interaction failed: {e}"
                )));
            }
        };
        if !opened {
            self.leave_menu(client).await;
            return Err(TradeError::State(format!(
                "category menu '{}' did not open",
                anchors.menu_label
            )));
        }

        // 2. Re-locate the exact listing. The merchant page may have
        //    changed since the scan.
        let page = match client.read_page_text().await {
            Ok(page) => page,
            Err(e) => {
                self.leave_menu(client).await;
                return Err(TradeError::State(format!("listing page unreadable: {e}")));
            }
        };
        if !page.contains(&offer.purchase_ref) {
            info!(offer = %offer, "Listing no longer present");
            self.leave_menu(client).await;
            return Ok(PurchaseOutcome::NotBought {
                reason: "listing no longer present".to_string(),
            });
        }

        // 3. Activate the purchase reference.
        match client.click_purchase_ref(&offer.purchase_ref).await {
            Ok(true) => {}
            Ok(false) => {
                info!(offer = %offer, "Purchase reference vanished before click");
                self.leave_menu(client).await;
                return Ok(PurchaseOutcome::NotBought {
                    reason: "purchase reference vanished".to_string(),
                });
            }
            Err(e) => {
                // Stale element: the listing changed under us.
                info!(offer = %offer, error = %e, "Purchase reference went stale");
                self.leave_menu(client).await;
                return Ok(PurchaseOutcome::NotBought {
                    reason: format!("purchase reference stale: {e}"),
                });
            }
        }

        // 4. Confirm. After a successful click the prompt must be there.
        match client.click_confirm().await {
            Ok(true) => {}
            Ok(false) => {
                self.leave_menu(client).await;
                return Err(TradeError::State(
                    "confirmation prompt absent".to_string(),
                ));
            }
            Err(e) => {
                self.leave_menu(client).await;
                return Err(TradeError::State(format!("confirmation failed: {e}")));
            }
        }

        self.leave_menu(client).await;
        info!(offer = %offer, "Purchase complete");
        Ok(PurchaseOutcome::Bought)
    }

    /// Best-effort return to a neutral menu state.
    async fn leave_menu(&self, client: &dyn GameClient) {
        if let Err(e) = client.exit_menu().await {
            warn!(error = %e, "Failed to return to neutral menu state");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockGameClient;
    use crate::types::{Category, PriceBasis};
    use chrono::Utc;

    fn make_offer() -> Offer {
        Offer {
            name: "Heiltrank".to_string(),
            cost: 1200,
            profit: 1100,
            category: Category::Spells,
            item_id: 42,
            purchase_ref: "item.php?action=kaufen&mit_item=42".to_string(),
            magical: false,
            basis: PriceBasis {
                catalog_price: Some(2000),
                player: None,
                fetched_at: Utc::now(),
                from_cache: true,
            },
        }
    }

    fn listing_page(with_ref: bool) -> String {
        if with_ref {
            r#"Warenliste: Zauber<br><b>Heiltrank</b> für 1.200 Gold <a href="item.php?action=kaufen&mit_item=42">kaufen</a><br>Ende der Warenliste"#.to_string()
        } else {
            "Warenliste: Zauber<br>Ende der Warenliste".to_string()
        }
    }

    #[tokio::test]
    async fn test_successful_purchase() {
        let mut client = MockGameClient::new();
        client
            .expect_open_category_menu()
            .returning(|_| Ok(true));
        client
            .expect_read_page_text()
            .returning(|| Ok(listing_page(true)));
        client
            .expect_click_purchase_ref()
            .returning(|_| Ok(true));
        client.expect_click_confirm().returning(|| Ok(true));
        client.expect_exit_menu().times(1).returning(|| Ok(()));

        let outcome = PurchaseExecutor::new()
            .purchase(&client, &make_offer())
            .await
            .unwrap();
        assert!(outcome.is_bought());
    }

    #[tokio::test]
    async fn test_vanished_listing_is_not_bought() {
        let mut client = MockGameClient::new();
        client
            .expect_open_category_menu()
            .returning(|_| Ok(true));
        client
            .expect_read_page_text()
            .returning(|| Ok(listing_page(false)));
        client.expect_exit_menu().times(1).returning(|| Ok(()));

        let outcome = PurchaseExecutor::new()
            .purchase(&client, &make_offer())
            .await
            .unwrap();
        assert!(matches!(outcome, PurchaseOutcome::NotBought { .. }));
    }

    #[tokio::test]
    async fn test_stale_click_is_not_bought() {
        let mut client = MockGameClient::new();
        client
            .expect_open_category_menu()
            .returning(|_| Ok(true));
        client
            .expect_read_page_text()
            .returning(|| Ok(listing_page(true)));
        client
            .expect_click_purchase_ref()
            .returning(|_| Err(anyhow::anyhow!("element stale")));
        client.expect_exit_menu().times(1).returning(|| Ok(()));

        let outcome = PurchaseExecutor::new()
            .purchase(&client, &make_offer())
            .await
            .unwrap();
        assert!(matches!(outcome, PurchaseOutcome::NotBought { .. }));
    }

    #[tokio::test]
    async fn test_menu_failure_is_structural() {
        let mut client = MockGameClient::new();
        client
            .expect_open_category_menu()
            .returning(|_| Ok(false));
        client.expect_exit_menu().returning(|| Ok(()));

        let result = PurchaseExecutor::new()
            .purchase(&client, &make_offer())
            .await;
        assert!(matches!(result, Err(TradeError::State(_))));
    }

    #[tokio::test]
    async fn test_absent_confirmation_is_structural() {
        let mut client = MockGameClient::new();
        client
            .expect_open_category_menu()
            .returning(|_| Ok(true));
        client
            .expect_read_page_text()
            .returning(|| Ok(listing_page(true)));
        client
            .expect_click_purchase_ref()
            .returning(|_| Ok(true));
        client.expect_click_confirm().returning(|| Ok(false));
        client.expect_exit_menu().times(1).returning(|| Ok(()));

        let result = PurchaseExecutor::new()
            .purchase(&client, &make_offer())
            .await;
        assert!(matches!(result, Err(TradeError::State(_))));
    }

    #[tokio::test]
    async fn test_exit_menu_failure_does_not_mask_outcome() {
        let mut client = MockGameClient::new();
        client
            .expect_open_category_menu()
            .returning(|_| Ok(true));
        client
            .expect_read_page_text()
            .returning(|| Ok(listing_page(false)));
        client
            .expect_exit_menu()
            .returning(|| Err(anyhow::anyhow!("already navigating")));

        let outcome = PurchaseExecutor::new()
            .purchase(&client, &make_offer())
            .await
            .unwrap();
        assert!(matches!(outcome, PurchaseOutcome::NotBought { .. }));
    }
}
