//! Candidate queue.
//!
//! Priority container of accepted offers, highest profit first. Ties are
//! broken arbitrarily. Cleared and refilled once per full category sweep.

use std::collections::BinaryHeap;

use crate::types::Offer;

/// Heap entry ordered by profit.
#[derive(Debug)]
struct Ranked(Offer);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.0.profit == other.0.profit
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.profit.cmp(&other.0.profit)
    }
}

/// Offers awaiting purchase, most profitable first.
#[derive(Debug, Default)]
pub struct CandidateQueue {
    heap: BinaryHeap<Ranked>,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, offer: Offer) {
        self.heap.push(Ranked(offer));
    }

    /// Remove and return the highest-profit offer.
    pub fn extract_max(&mut self) -> Option<Offer> {
        self.heap.pop().map(|r| r.0)
    }

    /// The highest-profit offer without removing it.
    pub fn peek(&self) -> Option<&Offer> {
        self.heap.peek().map(|r| &r.0)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
