//! Error taxonomy for the projection engine.
//!
//! Four failure families with distinct recovery paths:
//!
//! - [`SourceError`] — transport: recovered by the controller's backoff loop,
//!   surfaced only through the tail-state indicator, never as lost messages.
//! - [`SubmitError`] — outbound: surfaced as a terminal `transport_error`
//!   status on exactly the one affected message, never retried automatically.
//! - [`ProjectionError`] — one event failed to reduce: the event is skipped
//!   and the sticky degraded flag is raised until the next success.
//! - [`AdmissionError`] — incompatible gateway: fatal to the session, no
//!   retry, deliberately distinct from ordinary connectivity loss so "wrong
//!   backend" is tellable from "backend down".

use thiserror::Error;

/// Failure of the event source transport (snapshot fetch or tail read).
#[derive(Debug, Error)]
pub enum SourceError {
    /// Connection-level failure reaching the gateway.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The gateway answered with a non-success status.
    #[error("gateway returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The gateway answered, but the body did not parse.
    #[error("malformed gateway response: {0}")]
    Malformed(String),
}

/// Failure submitting an outbound intent envelope.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Connection-level failure reaching the gateway.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The gateway refused the envelope.
    #[error("gateway rejected intent with status {status}")]
    Rejected {
        /// HTTP status code.
        status: u16,
    },
}

/// A single event record failed to reduce.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The kind-specific payload did not match its expected shape.
    #[error("malformed {kind} payload: {reason}")]
    MalformedPayload {
        /// Event kind string of the offending record.
        kind: String,
        /// Deserialization failure detail.
        reason: String,
    },
}

/// The gateway failed the startup admission gate.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The gateway speaks a different interface version.
    #[error("interface version mismatch: gateway speaks v{actual}, this client requires v{required}")]
    VersionMismatch {
        /// Version this client requires.
        required: u32,
        /// Version the gateway declared.
        actual: u32,
    },

    /// A required capability surface is absent or disabled.
    #[error("required surface `{0}` is not enabled on this gateway")]
    MissingSurface(String),

    /// The capabilities probe itself could not be completed.
    #[error("capabilities probe failed: {0}")]
    Probe(String),
}

/// A user send was rejected before any side effect took place.
///
/// Transport failures are *not* reported here — by then the optimistic
/// message exists, and the failure is recorded as its `transport_error`
/// status instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The session is not in the connected state.
    #[error("not connected to the gateway")]
    NotConnected,

    /// No target model has been selected.
    #[error("no model selected")]
    NoModelSelected,

    /// The message text is empty or whitespace-only.
    #[error("message text is empty")]
    EmptyMessage,
}
