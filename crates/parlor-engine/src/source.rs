//! Transport contracts the engine consumes.
//!
//! The engine never speaks HTTP itself: it requires a source that can fetch a
//! bounded historical batch and produce a live, restartable sequence of new
//! records, a sink for outbound intents, and a one-shot capabilities probe.
//! `parlor-gateway` implements all three over HTTP/SSE; tests use in-memory
//! fakes.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::admission::Capabilities;
use crate::errors::{AdmissionError, SourceError, SubmitError};
use crate::submit::IntentEnvelope;
use crate::types::EventRecord;

/// A live tail of trail records.
///
/// Unbounded; ends only on transport failure. The controller reopens it from
/// scratch — implementations must tolerate repeated subscriptions and may
/// re-deliver history on each one.
pub type RecordStream = Pin<Box<dyn Stream<Item = Result<EventRecord, SourceError>> + Send>>;

/// One bounded historical batch of the trail.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPage {
    /// Records in trail order.
    pub events: Vec<EventRecord>,
    /// Total length of the trail at fetch time.
    pub length: u64,
}

/// Read side of the audit trail.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch a bounded historical batch starting at `offset`.
    async fn fetch_snapshot(&self, offset: u64, limit: u64) -> Result<SnapshotPage, SourceError>;

    /// Open a live subscription to records appended after `since`.
    ///
    /// `None` means "from wherever the gateway chooses" — callers must not
    /// rely on the start point, only on eventual convergence through the
    /// idempotent pipeline.
    async fn subscribe_tail(&self, since: Option<u64>) -> Result<RecordStream, SourceError>;
}

/// Write side: outbound intent ingress.
#[async_trait]
pub trait IntentSink: Send + Sync {
    /// Submit one intent envelope.
    async fn submit_intent(&self, envelope: &IntentEnvelope) -> Result<(), SubmitError>;
}

/// Startup capabilities probe (the admission gate's input).
#[async_trait]
pub trait CapabilitiesProbe: Send + Sync {
    /// Fetch the gateway's declared capabilities.
    async fn capabilities(&self) -> Result<Capabilities, AdmissionError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
