//! Bounded-memory exactly-once admission over an at-least-once stream.
//!
//! The trail redelivers records (snapshot + tail overlap, reconnect replay),
//! so every record passes this filter before reaching the reducer. Admitted
//! keys are remembered in strict FIFO order up to a fixed capacity; once the
//! window overflows, the single oldest key is forgotten regardless of how
//! recently it was hit. Keys older than the window can therefore be
//! re-admitted — acceptable because reduction is idempotent.

use std::collections::{HashSet, VecDeque};

use crate::types::DedupeKey;

/// Default admission window, in keys.
pub const DEFAULT_LEDGER_CAPACITY: usize = 10_000;

/// FIFO-bounded dedupe ledger.
#[derive(Debug)]
pub struct DedupeLedger {
    /// Admission order, oldest first.
    order: VecDeque<DedupeKey>,
    /// Membership index over `order`.
    seen: HashSet<DedupeKey>,
    capacity: usize,
}

impl Default for DedupeLedger {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_CAPACITY)
    }
}

impl DedupeLedger {
    /// Create a ledger holding at most `capacity` keys.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Admit a record by its derived key.
    ///
    /// Returns `true` (and remembers the key) when the key is unseen, or when
    /// the record has no stable identity (`None`) — such records are never
    /// deduped. Returns `false` without side effects when the key is still
    /// resident in the window.
    pub fn admit(&mut self, key: Option<DedupeKey>) -> bool {
        let Some(key) = key else {
            return true;
        };
        if self.seen.contains(&key) {
            return false;
        }

        let _ = self.seen.insert(key.clone());
        self.order.push_back(key);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                let _ = self.seen.remove(&oldest);
            }
        }
        true
    }

    /// Whether a key is currently resident.
    #[must_use]
    pub fn contains(&self, key: &DedupeKey) -> bool {
        self.seen.contains(key)
    }

    /// Number of resident keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no keys are resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
