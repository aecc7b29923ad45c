//! Event and projection types.
//!
//! - [`EventRecord`]: flat struct with base fields + opaque `payload` JSON,
//!   exactly as the audit trail delivers it.
//! - [`EventKind`]: INTENT / EXECUTION / DECISION, unknown kinds preserved.
//! - [`DedupeKey`]: the record's stable identity, when it has one.
//! - [`payloads`]: typed payload structs, accessed via
//!   [`EventRecord::typed_payload()`].
//! - [`message`]: projected [`ChatMessage`] / [`ThreadSummary`] state types.

pub mod message;
pub mod payloads;
pub mod record;

pub use message::{ChatMessage, DecisionMetadata, MessageRole, MessageStatus, ThreadSummary};
pub use payloads::{
    DecisionPayload, EventPayload, ExecutionFault, ExecutionPayload, IntentBody, IntentPayload,
};
pub use record::{DedupeKey, EventKind, EventRecord};
