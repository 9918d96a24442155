//! Telemetry/signal boundary.
//!
//! A key-value channel the service writes observable state to and reads
//! operator signals from. The channel itself is dumb storage; which keys
//! mean what is fixed by the `keys` module so the external consumer and
//! this process agree.

use std::collections::HashMap;
use std::sync::Mutex;

/// Well-known channel keys.
pub mod keys {
    pub const PHASE: &str = "routine.phase";
    pub const PROBLEM: &str = "routine.problem";
    pub const PROBLEM_SINCE: &str = "routine.problem_since";
    pub const GOLD_SPENT: &str = "totals.gold_spent";
    pub const PROFIT_EXPECTED: &str = "totals.profit_expected";
    pub const ITEMS_BOUGHT: &str = "totals.items_bought";
    pub const PURCHASES_FAILED: &str = "totals.purchases_failed";
    pub const CACHE_HIT_RATE: &str = "pricing.cache_hit_rate";
    /// JSON array of `BoughtItem`; appended by the service, reset by the
    /// external consumer.
    pub const BOUGHT_ITEMS: &str = "purchases.pending";
    pub const SIGNAL_START: &str = "signal.start";
    pub const SIGNAL_STOP: &str = "signal.stop";
    pub const SIGNAL_CLEAR_PROBLEM: &str = "signal.clear_problem";
}

/// Abstraction over the cross-process key-value bridge.
pub trait TelemetryChannel: Send + Sync {
    fn set(&self, key: &str, value: String);
    fn get(&self, key: &str) -> Option<String>;
    /// Read and remove — used for one-shot operator signals.
    fn take(&self, key: &str) -> Option<String>;
}

/// In-memory channel, also the test double.
#[derive(Debug, Default)]
pub struct InMemoryChannel {
    values: Mutex<HashMap<String, String>>,
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TelemetryChannel for InMemoryChannel {
    fn set(&self, key: &str, value: String) {
        self.values.lock().unwrap().insert(key.to_string(), value);
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn take(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().remove(key)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_roundtrip() {
        let channel = InMemoryChannel::new();
        channel.set(keys::PHASE, "ANALYZE".to_string());
        assert_eq!(channel.get(keys::PHASE), Some("ANALYZE".to_string()));
    }

    #[test]
    fn test_get_missing_key() {
        let channel = InMemoryChannel::new();
        assert!(channel.get("nope").is_none());
    }

    #[test]
    fn test_take_consumes_signal() {
        let channel = InMemoryChannel::new();
        channel.set(keys::SIGNAL_STOP, "1".to_string());
        assert_eq!(channel.take(keys::SIGNAL_STOP), Some("1".to_string()));
        assert!(channel.take(keys::SIGNAL_STOP).is_none());
    }

    #[test]
    fn test_set_overwrites() {
        let channel = InMemoryChannel::new();
        channel.set(keys::PHASE, "ANALYZE".to_string());
        channel.set(keys::PHASE, "PURCHASE".to_string());
        assert_eq!(channel.get(keys::PHASE), Some("PURCHASE".to_string()));
    }
}
