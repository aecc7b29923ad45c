//! # parlor-engine
//!
//! Deterministic, idempotent projection of a chat conversation from an
//! append-only intent/decision/execution audit trail.
//!
//! The gateway never answers a chat request directly; it only appends events
//! to a log that may deliver each record more than once (snapshot + tail
//! overlap, reconnect replay). This crate reconstructs ordered per-thread
//! message lists from that log:
//!
//! - **[`types`]**: [`types::EventRecord`] (flat base fields + opaque payload
//!   with typed opt-in access), [`types::ChatMessage`], [`types::DedupeKey`]
//! - **[`ledger`]**: bounded FIFO exactly-once admission filter
//! - **[`projection`]**: the reducer that folds accepted records into state
//! - **[`controller`]**: snapshot replay + restartable tail subscription
//! - **[`session`]**: the consumer-facing [`session::ChatSession`] facade
//!   (admission gate, outbound submission, thread operations)
//! - **[`source`]**: the transport contracts this engine consumes
//!   ([`source::EventSource`], [`source::IntentSink`],
//!   [`source::CapabilitiesProbe`]) — implemented by `parlor-gateway` or by
//!   in-memory fakes in tests
//! - **[`prefs`]**: injected local store for thread titles / hidden flags
//!
//! Correctness never depends on ordering or resume offsets: every path is
//! safe to replay because admission is deduplicating and reduction is
//! idempotent.

#![deny(unsafe_code)]

pub mod admission;
pub mod controller;
pub mod errors;
pub mod ledger;
pub mod prefs;
pub mod projection;
pub mod session;
pub mod source;
pub mod submit;
pub mod types;

pub use admission::{Capabilities, REQUIRED_INTERFACE_VERSION, REQUIRED_SURFACES};
pub use controller::{
    ControllerConfig, ProjectionHandle, ReconcileController, TailState, ThreadOverview,
};
pub use errors::{AdmissionError, ProjectionError, SendError, SourceError, SubmitError};
pub use ledger::DedupeLedger;
pub use projection::{Applied, ProjectionState};
pub use session::{ChatSession, ConnectionState, SessionBackend, SessionConfig};
pub use source::{CapabilitiesProbe, EventSource, IntentSink, RecordStream, SnapshotPage};
pub use submit::{ContextScope, DeclaredRef, IntentEnvelope};
pub use types::{ChatMessage, DedupeKey, EventKind, EventRecord, MessageRole, MessageStatus};
