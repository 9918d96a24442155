//! Trading routine — the phase state machine.
//!
//! One phase action per external tick:
//!
//! - `Analyze` visits the next category of the sweep, parses its listing,
//!   and merges accepted offers into the candidate queue. Completing the
//!   sweep decides the next phase: `Purchase` if candidates exist,
//!   `AwaitingDelivery` otherwise.
//! - `Purchase` pops the best candidate and makes exactly one purchase
//!   attempt, then moves to `Wait` regardless of outcome. An empty queue
//!   sends the routine back to `Analyze` for a fresh sweep.
//! - `Wait` polls the action budget and returns to `Purchase` once it
//!   allows a new market action.
//! - `AwaitingDelivery` watches the chat for the merchant's restock
//!   announcement, with a fixed delay as fallback, then starts a new sweep.
//!
//! The routine performs no retries and never handles its own structural
//! errors; those bubble to the service that ticks it.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::client::{anchors_for, GameClient, RESTOCK_ANNOUNCEMENT};
use crate::executor::{PurchaseExecutor, PurchaseOutcome};
use crate::parser::{ListingParser, OfferPolicy};
use crate::pricing::PriceStore;
use crate::queue::CandidateQueue;
use crate::types::{
    BoughtItem, Category, Offer, PriceBasis, RoutinePhase, SessionStats, TradeError,
};

// ---------------------------------------------------------------------------
// Tick outcome
// ---------------------------------------------------------------------------

/// What a single tick did. Side effects the caller may care about
/// (telemetry, purchase reporting) are carried here rather than hidden in
/// the routine.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    Scanned { category: Category, accepted: usize },
    Purchased(Offer),
    PurchaseFailed { name: String, reason: String },
    Waited { ready: bool },
    QueueExhausted,
    DeliveryWait { restocked: bool },
}

// ---------------------------------------------------------------------------
// Routine
// ---------------------------------------------------------------------------

pub struct TradingRoutine {
    client: Arc<dyn GameClient>,
    store: PriceStore,
    parser: ListingParser,
    executor: PurchaseExecutor,
    policy: Box<dyn OfferPolicy>,
    phase: RoutinePhase,
    /// Position of the next category to visit within [`Category::CYCLE`].
    sweep_pos: usize,
    queue: CandidateQueue,
    /// Completed purchases awaiting telemetry pickup.
    bought: Vec<BoughtItem>,
    stats: SessionStats,
    delivery_wait: Duration,
    awaiting_since: Option<DateTime<Utc>>,
}

impl TradingRoutine {
    pub fn new(
        client: Arc<dyn GameClient>,
        store: PriceStore,
        policy: Box<dyn OfferPolicy>,
        delivery_wait: Duration,
    ) -> Self {
        Self {
            client,
            store,
            parser: ListingParser::new(),
            executor: PurchaseExecutor::new(),
            policy,
            phase: RoutinePhase::Analyze,
            sweep_pos: 0,
            queue: CandidateQueue::new(),
            bought: Vec::new(),
            stats: SessionStats::new(Utc::now()),
            delivery_wait,
            awaiting_since: None,
        }
    }

    /// Execute exactly one phase action.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<TickOutcome, TradeError> {
        match self.phase {
            RoutinePhase::Analyze => self.step_analyze(now).await,
            RoutinePhase::Purchase => self.step_purchase(now).await,
            RoutinePhase::Wait => self.step_wait().await,
            RoutinePhase::AwaitingDelivery => self.step_delivery(now).await,
        }
    }

    // -- Phase actions ---------------------------------------------------

    async fn step_analyze(&mut self, now: DateTime<Utc>) -> Result<TickOutcome, TradeError> {
        // A new sweep starts from a clean slate.
        if self.sweep_pos == 0 {
            self.queue.clear();
        }
        let category = Category::CYCLE[self.sweep_pos];

        let opened = self
            .client
            .open_category_menu(category)
            .await
            .map_err(|e| TradeError::State(format!("category menu interaction failed: {e}")))?;
        if !opened {
            return Err(TradeError::State(format!(
                "category menu '{}' did not open",
                anchors_for(category).menu_label
            )));
        }

        let text = self
            .client
            .read_page_text()
            .await
            .map_err(|e| TradeError::State(format!("listing page unreadable: {e}")))?;

        let offers = self
            .parser
            .parse(category, &text, &mut self.store, self.policy.as_ref())
            .await?;
        let accepted = offers.len();
        for offer in offers {
            self.queue.insert(offer);
        }

        self.sweep_pos += 1;
        if self.sweep_pos == Category::CYCLE.len() {
            self.sweep_pos = 0;
            if self.queue.is_empty() {
                info!("Sweep complete, no candidates — awaiting next delivery");
                self.hold_for_delivery(now);
            } else {
                info!(candidates = self.queue.len(), "Sweep complete");
                self.phase = RoutinePhase::Purchase;
            }
        }

        Ok(TickOutcome::Scanned { category, accepted })
    }

    async fn step_purchase(&mut self, now: DateTime<Utc>) -> Result<TickOutcome, TradeError> {
        let Some(offer) = self.queue.extract_max() else {
            // Candidates were consumed or went stale; sweep again.
            debug!("Candidate queue exhausted, sweeping again");
            self.phase = RoutinePhase::Analyze;
            self.sweep_pos = 0;
            return Ok(TickOutcome::QueueExhausted);
        };

        match self.executor.purchase(self.client.as_ref(), &offer).await {
            Ok(PurchaseOutcome::Bought) => {
                self.stats.record_purchase(&offer);
                self.bought.push(BoughtItem::from_offer(&offer, now));
                self.phase = RoutinePhase::Wait;
                Ok(TickOutcome::Purchased(offer))
            }
            Ok(PurchaseOutcome::NotBought { reason }) => {
                self.stats.record_failure();
                // One attempt per tick, bought or not.
                self.phase = RoutinePhase::Wait;
                Ok(TickOutcome::PurchaseFailed {
                    name: offer.name,
                    reason,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn step_wait(&mut self) -> Result<TickOutcome, TradeError> {
        // Client trouble while polling keeps us waiting; the budget check
        // is repeated every tick anyway.
        let ready = self.client.can_act_now().await.unwrap_or(false);
        if ready {
            self.phase = RoutinePhase::Purchase;
        }
        Ok(TickOutcome::Waited { ready })
    }

    async fn step_delivery(&mut self, now: DateTime<Utc>) -> Result<TickOutcome, TradeError> {
        let restocked = match self.client.chat_history().await {
            Ok(messages) => messages.iter().any(|m| m.contains(RESTOCK_ANNOUNCEMENT)),
            Err(_) => false,
        };

        let deadline_passed = self
            .awaiting_since
            .map(|since| now - since >= self.delivery_wait)
            .unwrap_or(true);

        if restocked || deadline_passed {
            info!(restocked, "Delivery wait over, starting new sweep");
            self.awaiting_since = None;
            self.phase = RoutinePhase::Analyze;
            self.sweep_pos = 0;
        }

        Ok(TickOutcome::DeliveryWait { restocked })
    }

    // -- External control -------------------------------------------------

    /// Hold the routine in the delivery wait starting at `now`. Used on
    /// sweep completion with no candidates and by the outer service when a
    /// structural problem is observed.
    pub fn hold_for_delivery(&mut self, now: DateTime<Utc>) {
        self.phase = RoutinePhase::AwaitingDelivery;
        self.awaiting_since = Some(now);
    }

    // -- Accessors --------------------------------------------------------

    pub fn phase(&self) -> RoutinePhase {
        self.phase
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn candidates(&self) -> usize {
        self.queue.len()
    }

    /// Take the buffered purchase records for telemetry pickup.
    pub fn drain_bought(&mut self) -> Vec<BoughtItem> {
        std::mem::take(&mut self.bought)
    }

    /// Snapshot of the price cache for persistence.
    pub fn price_cache(&self) -> HashMap<String, PriceBasis> {
        self.store.export()
    }

    pub fn store(&self) -> &PriceStore {
        &self.store
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockGameClient;
    use crate::parser::ProfitPolicy;
    use crate::pricing::registry::TradeRegistry;
    use crate::types::PlayerQuote;

    /// Composite page with every category section; `spell_lines` is placed
    /// inside the Zauber section.
    fn composite_page(spell_lines: &str) -> String {
        let mut page = String::new();
        for cat in Category::CYCLE {
            let anchors = anchors_for(*cat);
            page.push_str(anchors.section_start);
            page.push_str("<br>");
            if *cat == Category::Spells {
                page.push_str(spell_lines);
                page.push_str("<br>");
            }
            page.push_str(anchors.section_end);
            page.push(' ');
        }
        page
    }

    fn seeded_store() -> PriceStore {
        let mut entries = HashMap::new();
        entries.insert(
            "Heiltrank".to_string(),
            PriceBasis {
                catalog_price: Some(2000),
                player: Some(PlayerQuote {
                    value: 1800,
                    observed_at: Utc::now(),
                    world: "welt4".to_string(),
                }),
                fetched_at: Utc::now(),
                from_cache: false,
            },
        );
        PriceStore::with_entries(None, None, TradeRegistry::default(), "welt4", entries)
    }

    fn make_routine(client: MockGameClient) -> TradingRoutine {
        TradingRoutine::new(
            Arc::new(client),
            seeded_store(),
            Box::new(ProfitPolicy::new(1, None)),
            Duration::minutes(15),
        )
    }

    const HEILTRANK_LINE: &str = r#"<b>Heiltrank</b> für 1.200 Gold <a href="item.php?action=kaufen&mit_item=42">kaufen</a>"#;

    async fn run_sweep(routine: &mut TradingRoutine) {
        let now = Utc::now();
        for _ in Category::CYCLE {
            routine.tick(now).await.unwrap();
        }
    }

    // -- Analyze ----------------------------------------------------------

    #[tokio::test]
    async fn test_empty_sweep_transitions_to_delivery_wait() {
        let mut client = MockGameClient::new();
        client.expect_open_category_menu().returning(|_| Ok(true));
        client
            .expect_read_page_text()
            .returning(|| Ok(composite_page("")));

        let mut routine = make_routine(client);
        run_sweep(&mut routine).await;
        assert_eq!(routine.phase(), RoutinePhase::AwaitingDelivery);
    }

    #[tokio::test]
    async fn test_sweep_with_candidate_transitions_to_purchase() {
        let mut client = MockGameClient::new();
        client.expect_open_category_menu().returning(|_| Ok(true));
        client
            .expect_read_page_text()
            .returning(|| Ok(composite_page(HEILTRANK_LINE)));

        let mut routine = make_routine(client);
        run_sweep(&mut routine).await;
        assert_eq!(routine.phase(), RoutinePhase::Purchase);
        assert_eq!(routine.candidates(), 1);
    }

    #[tokio::test]
    async fn test_analyze_stays_mid_sweep() {
        let mut client = MockGameClient::new();
        client.expect_open_category_menu().returning(|_| Ok(true));
        client
            .expect_read_page_text()
            .returning(|| Ok(composite_page("")));

        let mut routine = make_routine(client);
        routine.tick(Utc::now()).await.unwrap();
        assert_eq!(routine.phase(), RoutinePhase::Analyze);
    }

    #[tokio::test]
    async fn test_unopened_menu_is_structural_error() {
        let mut client = MockGameClient::new();
        client.expect_open_category_menu().returning(|_| Ok(false));

        let mut routine = make_routine(client);
        let result = routine.tick(Utc::now()).await;
        assert!(matches!(result, Err(TradeError::State(_))));
        // The routine itself does not move; the service decides.
        assert_eq!(routine.phase(), RoutinePhase::Analyze);
    }

    // -- Purchase ----------------------------------------------------------

    #[tokio::test]
    async fn test_purchase_success_moves_to_wait_and_buffers_item() {
        let mut client = MockGameClient::new();
        client.expect_open_category_menu().returning(|_| Ok(true));
        client
            .expect_read_page_text()
            .returning(|| Ok(composite_page(HEILTRANK_LINE)));
        client.expect_click_purchase_ref().returning(|_| Ok(true));
        client.expect_click_confirm().returning(|| Ok(true));
        client.expect_exit_menu().returning(|| Ok(()));

        let mut routine = make_routine(client);
        run_sweep(&mut routine).await;

        let outcome = routine.tick(Utc::now()).await.unwrap();
        assert!(matches!(outcome, TickOutcome::Purchased(_)));
        assert_eq!(routine.phase(), RoutinePhase::Wait);
        assert_eq!(routine.stats().items_bought, 1);
        assert_eq!(routine.stats().gold_spent, 1200);

        let bought = routine.drain_bought();
        assert_eq!(bought.len(), 1);
        assert_eq!(bought[0].name, "Heiltrank");
        assert!(routine.drain_bought().is_empty(), "drain resets the buffer");
    }

    #[tokio::test]
    async fn test_vanished_listing_still_moves_to_wait() {
        let mut client = MockGameClient::new();
        client.expect_open_category_menu().returning(|_| Ok(true));
        // Scan sees the offer; the purchase re-read does not.
        let mut pages = vec![composite_page("")];
        for _ in Category::CYCLE {
            pages.insert(0, composite_page(HEILTRANK_LINE));
        }
        client
            .expect_read_page_text()
            .returning(move || Ok(pages.remove(0)));
        client.expect_exit_menu().returning(|| Ok(()));

        let mut routine = make_routine(client);
        run_sweep(&mut routine).await;

        let outcome = routine.tick(Utc::now()).await.unwrap();
        assert!(matches!(outcome, TickOutcome::PurchaseFailed { .. }));
        assert_eq!(routine.phase(), RoutinePhase::Wait);
        assert_eq!(routine.stats().purchases_failed, 1);
    }

    #[tokio::test]
    async fn test_exhausted_queue_returns_to_analyze() {
        let mut client = MockGameClient::new();
        client.expect_open_category_menu().returning(|_| Ok(true));
        client
            .expect_read_page_text()
            .returning(|| Ok(composite_page(HEILTRANK_LINE)));
        client.expect_click_purchase_ref().returning(|_| Ok(true));
        client.expect_click_confirm().returning(|| Ok(true));
        client.expect_exit_menu().returning(|| Ok(()));
        client.expect_can_act_now().returning(|| Ok(true));

        let mut routine = make_routine(client);
        run_sweep(&mut routine).await;

        routine.tick(Utc::now()).await.unwrap(); // buys the only candidate
        routine.tick(Utc::now()).await.unwrap(); // wait → ready
        assert_eq!(routine.phase(), RoutinePhase::Purchase);

        let outcome = routine.tick(Utc::now()).await.unwrap();
        assert!(matches!(outcome, TickOutcome::QueueExhausted));
        assert_eq!(routine.phase(), RoutinePhase::Analyze);
    }

    // -- Wait --------------------------------------------------------------

    #[tokio::test]
    async fn test_wait_holds_until_budget_allows() {
        let mut client = MockGameClient::new();
        let mut answers = vec![false, false, true];
        client
            .expect_can_act_now()
            .returning(move || Ok(answers.remove(0)));

        let mut routine = make_routine(client);
        routine.phase = RoutinePhase::Wait;

        routine.tick(Utc::now()).await.unwrap();
        assert_eq!(routine.phase(), RoutinePhase::Wait);
        routine.tick(Utc::now()).await.unwrap();
        assert_eq!(routine.phase(), RoutinePhase::Wait);
        routine.tick(Utc::now()).await.unwrap();
        assert_eq!(routine.phase(), RoutinePhase::Purchase);
    }

    // -- AwaitingDelivery --------------------------------------------------

    #[tokio::test]
    async fn test_restock_announcement_ends_delivery_wait() {
        let mut client = MockGameClient::new();
        client.expect_chat_history().returning(|| {
            Ok(vec![
                "Spieler A: hat jemand einen Heiltrank?".to_string(),
                RESTOCK_ANNOUNCEMENT.to_string(),
            ])
        });

        let mut routine = make_routine(client);
        let now = Utc::now();
        routine.hold_for_delivery(now);

        let outcome = routine.tick(now).await.unwrap();
        assert!(matches!(outcome, TickOutcome::DeliveryWait { restocked: true }));
        assert_eq!(routine.phase(), RoutinePhase::Analyze);
    }

    #[tokio::test]
    async fn test_delivery_wait_times_out_without_announcement() {
        let mut client = MockGameClient::new();
        client.expect_chat_history().returning(|| Ok(Vec::new()));

        let mut routine = make_routine(client);
        let start = Utc::now();
        routine.hold_for_delivery(start);

        routine.tick(start + Duration::minutes(1)).await.unwrap();
        assert_eq!(routine.phase(), RoutinePhase::AwaitingDelivery);

        routine.tick(start + Duration::minutes(16)).await.unwrap();
        assert_eq!(routine.phase(), RoutinePhase::Analyze);
    }
}
