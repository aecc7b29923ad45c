//! Reconnect policy for the tail subscription restart loop.
//!
//! The live tail carries no protocol-level resume token, so recovery is
//! always "reopen from scratch after a fixed pause" — correctness comes from
//! the idempotent projection pipeline, not from resumption. The only tunable
//! is the pause itself.

use std::time::Duration;

/// Default pause between tail subscription attempts.
pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

/// Policy governing how the reconciliation controller reopens a dropped
/// tail subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Fixed delay before each reopen attempt.
    pub backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            backoff: DEFAULT_RECONNECT_BACKOFF,
        }
    }
}

impl ReconnectPolicy {
    /// Create a policy with a custom backoff (tests use millisecond pauses).
    #[must_use]
    pub fn with_backoff(backoff: Duration) -> Self {
        Self { backoff }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
