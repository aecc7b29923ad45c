//! Tracing subscriber setup.
//!
//! Filtering is controlled by `PARLOR_LOG` (falling back to `RUST_LOG`, then
//! `info`). Safe to call more than once — later calls are no-ops.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Reads `PARLOR_LOG` (or `RUST_LOG`) for the filter directive. Returns
/// quietly if a subscriber is already installed, so tests and embedding
/// applications can both call this unconditionally.
pub fn init_tracing() {
    let filter = std::env::var("PARLOR_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_owned());

    let result = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(true)
        .try_init();
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_does_not_panic() {
        init_tracing();
        init_tracing();
    }
}
