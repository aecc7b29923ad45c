//! The [`EventRecord`] struct — the unit of the audit trail.
//!
//! Records arrive as flat JSON with base fields at the top level and a
//! kind-specific `payload` object. The payload is stored as opaque
//! [`serde_json::Value`] for exact wire fidelity; typed access is opt-in via
//! [`EventRecord::typed_payload()`].
//!
//! Records are immutable once observed: nothing in the engine mutates one.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use parlor_core::ids::{CorrelationId, ThreadId, TurnId};

use super::payloads::EventPayload;
use crate::errors::ProjectionError;

/// Event kind discriminator.
///
/// The trail is open-ended: kinds this client does not understand are
/// preserved verbatim in [`EventKind::Other`] so they survive round-trips
/// and still participate in dedupe-key derivation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// A request to act (here: a chat message).
    Intent,
    /// The outcome of carrying out an intent.
    Execution,
    /// A policy allow/deny verdict over an intent.
    Decision,
    /// Any kind this client does not recognize, preserved opaquely.
    Other(String),
}

impl EventKind {
    /// The wire string for this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Intent => "INTENT",
            Self::Execution => "EXECUTION",
            Self::Decision => "DECISION",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "INTENT" => Self::Intent,
            "EXECUTION" => Self::Execution,
            "DECISION" => Self::Decision,
            _ => Self::Other(s),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

/// One record of the append-only audit trail.
///
/// Every field except `kind` and `payload` is optional on the wire. A record
/// without a `thread_id` is not attributable to any conversation and is
/// dropped without effect by the reducer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Kind discriminator (`INTENT`, `EXECUTION`, `DECISION`, or opaque).
    pub kind: EventKind,
    /// Conversation thread this record belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<ThreadId>,
    /// Logical exchange this record belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<TurnId>,
    /// Causal-chain identifier spanning intent, decision, and execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    /// Monotonic position in the trail, when the gateway assigns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    /// Content-addressed identity, when the gateway computes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// ISO 8601 timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Gateway-assigned record identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Gateway-side creation timestamp (distinct from `timestamp` on some
    /// backends).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Kind-specific data (opaque JSON).
    #[serde(default)]
    pub payload: Value,
}

impl EventRecord {
    /// Deserialize the payload into its kind-specific typed shape.
    ///
    /// Unknown kinds come back as [`EventPayload::Other`] without touching
    /// the payload. A payload that does not match its kind's shape is a
    /// [`ProjectionError`] — the caller skips the record and raises the
    /// degraded flag rather than failing the pipeline.
    pub fn typed_payload(&self) -> Result<EventPayload, ProjectionError> {
        let malformed = |e: serde_json::Error| ProjectionError::MalformedPayload {
            kind: self.kind.as_str().to_owned(),
            reason: e.to_string(),
        };
        match &self.kind {
            EventKind::Intent => serde_json::from_value(self.payload.clone())
                .map(EventPayload::Intent)
                .map_err(malformed),
            EventKind::Execution => serde_json::from_value(self.payload.clone())
                .map(EventPayload::Execution)
                .map_err(malformed),
            EventKind::Decision => serde_json::from_value(self.payload.clone())
                .map(EventPayload::Decision)
                .map_err(malformed),
            EventKind::Other(_) => Ok(EventPayload::Other(self.payload.clone())),
        }
    }
}

/// The stable identity of a record, used for at-least-once → exactly-once
/// admission.
///
/// Derivation priority:
///
/// 1. `digest` when present (content-addressed, strongest);
/// 2. `thread_id|turn_id|kind|index` when `index` is present;
/// 3. `thread_id|turn_id|kind|(event_id or created_at)` when either exists;
/// 4. otherwise the record has no stable identity — [`DedupeKey::derive`]
///    returns `None` and the ledger always admits it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DedupeKey(String);

impl DedupeKey {
    /// Derive the record's dedupe key, if it has a stable identity.
    #[must_use]
    pub fn derive(record: &EventRecord) -> Option<Self> {
        if let Some(digest) = &record.digest {
            return Some(Self(digest.clone()));
        }

        let thread = record.thread_id.as_ref().map_or("", ThreadId::as_str);
        let turn = record.turn_id.as_ref().map_or("", TurnId::as_str);
        let kind = record.kind.as_str();

        if let Some(index) = record.index {
            return Some(Self(format!("{thread}|{turn}|{kind}|{index}")));
        }

        record
            .event_id
            .as_deref()
            .or(record.created_at.as_deref())
            .map(|tag| Self(format!("{thread}|{turn}|{kind}|{tag}")))
    }

    /// View the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(kind: &str) -> EventRecord {
        serde_json::from_value(json!({
            "kind": kind,
            "thread_id": "t1",
            "turn_id": "u1",
            "correlation_id": "c1",
            "payload": {}
        }))
        .unwrap()
    }

    // ── EventKind ────────────────────────────────────────────────────────

    #[test]
    fn kind_roundtrips_known_strings() {
        for (s, kind) in [
            ("INTENT", EventKind::Intent),
            ("EXECUTION", EventKind::Execution),
            ("DECISION", EventKind::Decision),
        ] {
            assert_eq!(EventKind::from(s.to_owned()), kind);
            assert_eq!(kind.as_str(), s);
        }
    }

    #[test]
    fn kind_preserves_unknown_strings() {
        let kind = EventKind::from("AUDIT_CHECKPOINT".to_owned());
        assert_eq!(kind, EventKind::Other("AUDIT_CHECKPOINT".into()));
        assert_eq!(String::from(kind), "AUDIT_CHECKPOINT");
    }

    #[test]
    fn record_deserializes_from_wire_json() {
        let rec = record("INTENT");
        assert_eq!(rec.kind, EventKind::Intent);
        assert_eq!(rec.thread_id.as_ref().unwrap().as_str(), "t1");
        assert!(rec.index.is_none());
    }

    #[test]
    fn record_with_unknown_kind_survives_roundtrip() {
        let rec = record("LEASE_RENEWAL");
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["kind"], "LEASE_RENEWAL");
        let back: EventRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, rec);
    }

    // ── DedupeKey ────────────────────────────────────────────────────────

    #[test]
    fn digest_wins_over_everything() {
        let mut rec = record("INTENT");
        rec.digest = Some("sha256:abc".into());
        rec.index = Some(7);
        assert_eq!(DedupeKey::derive(&rec).unwrap().as_str(), "sha256:abc");
    }

    #[test]
    fn index_key_when_no_digest() {
        let mut rec = record("INTENT");
        rec.index = Some(7);
        assert_eq!(
            DedupeKey::derive(&rec).unwrap().as_str(),
            "t1|u1|INTENT|7"
        );
    }

    #[test]
    fn event_id_key_when_no_index() {
        let mut rec = record("EXECUTION");
        rec.event_id = Some("evt-9".into());
        assert_eq!(
            DedupeKey::derive(&rec).unwrap().as_str(),
            "t1|u1|EXECUTION|evt-9"
        );
    }

    #[test]
    fn created_at_is_the_last_resort_tag() {
        let mut rec = record("DECISION");
        rec.created_at = Some("2026-01-01T00:00:00Z".into());
        assert_eq!(
            DedupeKey::derive(&rec).unwrap().as_str(),
            "t1|u1|DECISION|2026-01-01T00:00:00Z"
        );
    }

    #[test]
    fn no_stable_identity_yields_none() {
        let rec = record("INTENT");
        assert!(DedupeKey::derive(&rec).is_none());
    }

    #[test]
    fn missing_base_fields_become_empty_segments() {
        let mut rec = record("INTENT");
        rec.thread_id = None;
        rec.turn_id = None;
        rec.index = Some(1);
        assert_eq!(DedupeKey::derive(&rec).unwrap().as_str(), "||INTENT|1");
    }

    #[test]
    fn typed_payload_rejects_non_object() {
        let mut rec = record("INTENT");
        rec.payload = json!("not an object");
        assert!(rec.typed_payload().is_err());
    }

    #[test]
    fn typed_payload_passes_unknown_kind_through() {
        let mut rec = record("LEASE_RENEWAL");
        rec.payload = json!({"anything": true});
        match rec.typed_payload().unwrap() {
            EventPayload::Other(v) => assert_eq!(v["anything"], true),
            other => panic!("expected opaque payload, got {other:?}"),
        }
    }
}
