//! Trading service — the outer per-tick driver.
//!
//! Owns the routine and the two cadences: every call to [`TradingService::tick`]
//! is one fast routine tick, while telemetry pushes and operator signals run
//! on the slower telemetry interval. Pause/stop is cooperative — signals are
//! observed only at the telemetry boundary and never interrupt an in-flight
//! phase action.
//!
//! The service also owns the problem flag: a structural State error, or
//! repeated Format errors, hold the routine in its delivery wait until the
//! operator clears the problem through the signal channel.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::pricing::report::ReportClient;
use crate::routine::{TickOutcome, TradingRoutine};
use crate::telemetry::{keys, TelemetryChannel};
use crate::types::{BoughtItem, TradeError};

/// Consecutive parse failures tolerated before the problem flag is raised.
const FORMAT_ERROR_THRESHOLD: u32 = 3;

/// An operator-visible problem, timestamped for the telemetry boundary.
#[derive(Debug, Clone)]
pub struct Problem {
    pub message: String,
    pub since: DateTime<Utc>,
}

pub struct TradingService {
    routine: TradingRoutine,
    channel: Arc<dyn TelemetryChannel>,
    reporter: Option<ReportClient>,
    telemetry_interval: Duration,
    last_telemetry: Option<DateTime<Utc>>,
    paused: bool,
    problem: Option<Problem>,
    format_streak: u32,
}

impl TradingService {
    pub fn new(
        routine: TradingRoutine,
        channel: Arc<dyn TelemetryChannel>,
        reporter: Option<ReportClient>,
        telemetry_interval: Duration,
    ) -> Self {
        Self {
            routine,
            channel,
            reporter,
            telemetry_interval,
            last_telemetry: None,
            paused: false,
            problem: None,
            format_streak: 0,
        }
    }

    /// One fast tick. Telemetry and signal handling piggyback when the slow
    /// interval has elapsed.
    pub async fn tick(&mut self, now: DateTime<Utc>) {
        if self.telemetry_due(now) {
            self.poll_signals();
            self.push_snapshot(now);
            self.last_telemetry = Some(now);
        }

        if self.paused || self.problem.is_some() {
            return;
        }

        let before = self.routine.phase();
        match self.routine.tick(now).await {
            Ok(outcome) => self.handle_outcome(outcome, now).await,
            Err(e) => self.observe_error(e, now),
        }
        let after = self.routine.phase();
        if before != after {
            // Observers see phase changes without waiting for the slow poll.
            self.channel.set(keys::PHASE, after.to_string());
        }
    }

    fn telemetry_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_telemetry {
            None => true,
            Some(last) => now - last >= self.telemetry_interval,
        }
    }

    // -- Signals -----------------------------------------------------------

    fn poll_signals(&mut self) {
        // Both signals are consumed at the boundary; mid-interval writes
        // wait here. Stop wins when both are present.
        let stop = self.channel.take(keys::SIGNAL_STOP).is_some();
        let start = self.channel.take(keys::SIGNAL_START).is_some();
        if stop {
            if !self.paused {
                info!("Stop signal observed, pausing routine");
            }
            self.paused = true;
        } else if start {
            if self.paused {
                info!("Start signal observed, resuming routine");
            }
            self.paused = false;
        }

        if self.channel.take(keys::SIGNAL_CLEAR_PROBLEM).is_some() && self.problem.is_some() {
            info!("Problem cleared by operator");
            self.problem = None;
            self.format_streak = 0;
        }
    }

    // -- Outcomes and errors -----------------------------------------------

    async fn handle_outcome(&mut self, outcome: TickOutcome, now: DateTime<Utc>) {
        self.format_streak = 0;

        if let TickOutcome::Purchased(offer) = outcome {
            info!(offer = %offer, "Item bought");
            if let Some(reporter) = &self.reporter {
                let item = BoughtItem::from_offer(&offer, now);
                let world = self.routine.store().world();
                if let Err(e) = reporter.report_purchase(&item, &offer.basis, world).await {
                    let error = TradeError::TransientIo(e.to_string());
                    warn!(error = %error, "Purchase report failed, continuing");
                }
            }
        }
    }

    fn observe_error(&mut self, error: TradeError, now: DateTime<Utc>) {
        match &error {
            TradeError::State(_) => self.raise_problem(error.to_string(), now),
            TradeError::Format { .. } => {
                self.format_streak += 1;
                warn!(error = %error, streak = self.format_streak, "Parse failure");
                if self.format_streak >= FORMAT_ERROR_THRESHOLD {
                    self.raise_problem(error.to_string(), now);
                }
            }
            _ => warn!(error = %error, "Recoverable error surfaced from routine"),
        }
    }

    fn raise_problem(&mut self, message: String, now: DateTime<Utc>) {
        warn!(problem = %message, "Problem raised, holding routine");
        self.routine.hold_for_delivery(now);
        self.channel
            .set(keys::PHASE, self.routine.phase().to_string());
        self.channel.set(keys::PROBLEM, message.clone());
        self.channel.set(keys::PROBLEM_SINCE, now.to_rfc3339());
        self.problem = Some(Problem { message, since: now });
    }

    // -- Telemetry snapshot -------------------------------------------------

    fn push_snapshot(&mut self, now: DateTime<Utc>) {
        let stats = self.routine.stats();
        self.channel
            .set(keys::PHASE, self.routine.phase().to_string());
        self.channel
            .set(keys::GOLD_SPENT, stats.gold_spent.to_string());
        self.channel
            .set(keys::PROFIT_EXPECTED, stats.profit_expected.to_string());
        self.channel
            .set(keys::ITEMS_BOUGHT, stats.items_bought.to_string());
        self.channel
            .set(keys::PURCHASES_FAILED, stats.purchases_failed.to_string());
        self.channel.set(
            keys::CACHE_HIT_RATE,
            format!("{:.2}", self.routine.store().hit_rate()),
        );

        match &self.problem {
            Some(problem) => {
                self.channel.set(keys::PROBLEM, problem.message.clone());
                self.channel
                    .set(keys::PROBLEM_SINCE, problem.since.to_rfc3339());
            }
            None => {
                self.channel.set(keys::PROBLEM, String::new());
            }
        }

        // Newly bought items are appended; the external consumer takes and
        // resets the key once per poll.
        let drained = self.routine.drain_bought();
        if !drained.is_empty() {
            let mut pending: Vec<BoughtItem> = self
                .channel
                .get(keys::BOUGHT_ITEMS)
                .and_then(|raw| serde_json::from_str(&raw).ok())
                .unwrap_or_default();
            pending.extend(drained);
            match serde_json::to_string(&pending) {
                Ok(json) => self.channel.set(keys::BOUGHT_ITEMS, json),
                Err(e) => warn!(error = %e, "Failed to serialize bought items"),
            }
        }

        let _ = now;
    }

    // -- Accessors ----------------------------------------------------------

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn problem(&self) -> Option<&Problem> {
        self.problem.as_ref()
    }

    pub fn routine(&self) -> &TradingRoutine {
        &self.routine
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
