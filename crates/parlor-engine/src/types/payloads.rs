//! Typed payload shapes for each event kind.
//!
//! Every field is optional: the gateway's envelope has grown accretively and
//! older producers omit fields freely. Absence must never block projection —
//! the reducer decides per kind whether a record with missing pieces is
//! projectable or silently dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::MessageStatus;

/// The intent type string for chat messages.
pub const CHAT_MESSAGE_INTENT: &str = "chat.message";

/// Typed view over an [`super::EventRecord`]'s payload, one variant per kind.
#[derive(Clone, Debug, PartialEq)]
pub enum EventPayload {
    /// `INTENT` payload.
    Intent(IntentPayload),
    /// `EXECUTION` payload.
    Execution(ExecutionPayload),
    /// `DECISION` payload.
    Decision(DecisionPayload),
    /// Unrecognized kind, preserved opaquely.
    Other(Value),
}

/// Payload of an `INTENT` record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentPayload {
    /// Logical intent type (`chat.message` is the only one projected).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_type: Option<String>,
    /// Message text at the shallow nesting depth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Inner body — newer producers nest the message one level down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<IntentBody>,
    /// Model the sender requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_model_id: Option<String>,
}

/// Inner body of an intent payload (the deeper nesting depth).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentBody {
    /// Message text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Model the sender requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_model_id: Option<String>,
}

impl IntentPayload {
    /// Whether this intent is a chat message (the only projectable type).
    #[must_use]
    pub fn is_chat_message(&self) -> bool {
        self.intent_type.as_deref() == Some(CHAT_MESSAGE_INTENT)
    }

    /// Extract the message text, probing the two known nesting depths.
    ///
    /// The inner body wins; empty strings count as absent at both depths.
    #[must_use]
    pub fn message_text(&self) -> Option<&str> {
        self.payload
            .as_ref()
            .and_then(|body| body.message.as_deref())
            .filter(|text| !text.is_empty())
            .or_else(|| self.message.as_deref().filter(|text| !text.is_empty()))
    }
}

/// Payload of an `EXECUTION` record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPayload {
    /// Direct output text, when the execution produced plain text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_text: Option<String>,
    /// Failure detail, when the execution errored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionFault>,
    /// Result object — either a plain string or `{"text": ...}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Error detail inside an execution payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionFault {
    /// Human-readable failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Machine failure code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ExecutionPayload {
    /// Resolve the displayable content of this execution, with the status it
    /// implies.
    ///
    /// Resolution order: direct `output_text`; else a synthesized error line
    /// (marking the message [`MessageStatus::ExecutionError`]); else the
    /// `result` — used directly when it is plain text, via its `text` field
    /// otherwise. `None` means the record is partial and must not produce a
    /// message at all.
    #[must_use]
    pub fn resolve_content(&self) -> Option<(String, MessageStatus)> {
        if let Some(text) = self.output_text.as_deref().filter(|t| !t.is_empty()) {
            return Some((text.to_owned(), MessageStatus::ObservedExecution));
        }

        if let Some(fault) = &self.error {
            let detail = fault
                .message
                .as_deref()
                .or(fault.code.as_deref())
                .unwrap_or("unknown");
            return Some((
                format!("Execution Error: {detail}"),
                MessageStatus::ExecutionError,
            ));
        }

        let text = match self.result.as_ref()? {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::Object(map) => match map.get("text") {
                Some(Value::String(s)) if !s.is_empty() => s.clone(),
                _ => return None,
            },
            _ => return None,
        };
        Some((text, MessageStatus::ObservedExecution))
    }
}

/// Payload of a `DECISION` record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionPayload {
    /// Verdict string — only `DENY` produces visible effects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,
    /// Human-readable denial reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Digest of the context the decision was evaluated over.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_digest: Option<String>,
    /// Digest of the decision record itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_digest: Option<String>,
    /// Machine reason codes backing the verdict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_codes: Option<Vec<String>>,
}

impl DecisionPayload {
    /// Whether this decision is a denial.
    #[must_use]
    pub fn is_deny(&self) -> bool {
        self.decision.as_deref() == Some("DENY")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── IntentPayload ────────────────────────────────────────────────────

    #[test]
    fn inner_message_depth_wins() {
        let p: IntentPayload = serde_json::from_value(json!({
            "intent_type": "chat.message",
            "message": "outer",
            "payload": {"message": "inner"}
        }))
        .unwrap();
        assert_eq!(p.message_text(), Some("inner"));
    }

    #[test]
    fn shallow_message_is_the_fallback() {
        let p: IntentPayload = serde_json::from_value(json!({
            "intent_type": "chat.message",
            "message": "outer"
        }))
        .unwrap();
        assert_eq!(p.message_text(), Some("outer"));
    }

    #[test]
    fn empty_inner_falls_through_to_outer() {
        let p: IntentPayload = serde_json::from_value(json!({
            "message": "outer",
            "payload": {"message": ""}
        }))
        .unwrap();
        assert_eq!(p.message_text(), Some("outer"));
    }

    #[test]
    fn no_message_at_either_depth() {
        let p: IntentPayload = serde_json::from_value(json!({
            "intent_type": "chat.message",
            "payload": {}
        }))
        .unwrap();
        assert_eq!(p.message_text(), None);
    }

    #[test]
    fn non_chat_intent_types_are_recognized() {
        let p: IntentPayload =
            serde_json::from_value(json!({"intent_type": "tool.invoke"})).unwrap();
        assert!(!p.is_chat_message());
    }

    #[test]
    fn unknown_payload_fields_are_tolerated() {
        let p: IntentPayload = serde_json::from_value(json!({
            "intent_type": "chat.message",
            "message": "hi",
            "stream_id": "default",
            "inputs": {"principal_id": "someone"}
        }))
        .unwrap();
        assert_eq!(p.message_text(), Some("hi"));
    }

    // ── ExecutionPayload ─────────────────────────────────────────────────

    #[test]
    fn output_text_resolves_directly() {
        let p: ExecutionPayload =
            serde_json::from_value(json!({"output_text": "hello back"})).unwrap();
        assert_eq!(
            p.resolve_content(),
            Some(("hello back".into(), MessageStatus::ObservedExecution))
        );
    }

    #[test]
    fn error_synthesizes_message_and_status() {
        let p: ExecutionPayload = serde_json::from_value(json!({
            "error": {"message": "model overloaded", "code": "E503"}
        }))
        .unwrap();
        assert_eq!(
            p.resolve_content(),
            Some((
                "Execution Error: model overloaded".into(),
                MessageStatus::ExecutionError
            ))
        );
    }

    #[test]
    fn error_code_backs_up_missing_message() {
        let p: ExecutionPayload =
            serde_json::from_value(json!({"error": {"code": "E503"}})).unwrap();
        assert_eq!(
            p.resolve_content().unwrap().0,
            "Execution Error: E503".to_owned()
        );
    }

    #[test]
    fn output_text_wins_over_error() {
        let p: ExecutionPayload = serde_json::from_value(json!({
            "output_text": "partial output",
            "error": {"message": "late failure"}
        }))
        .unwrap();
        assert_eq!(
            p.resolve_content().unwrap().1,
            MessageStatus::ObservedExecution
        );
    }

    #[test]
    fn string_result_resolves() {
        let p: ExecutionPayload = serde_json::from_value(json!({"result": "plain"})).unwrap();
        assert_eq!(p.resolve_content().unwrap().0, "plain");
    }

    #[test]
    fn nested_result_text_resolves() {
        let p: ExecutionPayload =
            serde_json::from_value(json!({"result": {"text": "nested"}})).unwrap();
        assert_eq!(p.resolve_content().unwrap().0, "nested");
    }

    #[test]
    fn partial_execution_resolves_to_nothing() {
        let p: ExecutionPayload = serde_json::from_value(json!({})).unwrap();
        assert_eq!(p.resolve_content(), None);
        let p: ExecutionPayload =
            serde_json::from_value(json!({"result": {"status": "ok"}})).unwrap();
        assert_eq!(p.resolve_content(), None);
    }

    // ── DecisionPayload ──────────────────────────────────────────────────

    #[test]
    fn deny_is_recognized() {
        let p: DecisionPayload =
            serde_json::from_value(json!({"decision": "DENY", "reason": "rate_limited"})).unwrap();
        assert!(p.is_deny());
    }

    #[test]
    fn allow_is_not_deny() {
        let p: DecisionPayload = serde_json::from_value(json!({"decision": "ALLOW"})).unwrap();
        assert!(!p.is_deny());
    }

    #[test]
    fn decision_metadata_is_optional() {
        let p: DecisionPayload = serde_json::from_value(json!({
            "decision": "DENY",
            "context_digest": "ctx:1",
            "reason_codes": ["RATE_LIMIT", "BUDGET"]
        }))
        .unwrap();
        assert_eq!(p.context_digest.as_deref(), Some("ctx:1"));
        assert!(p.decision_digest.is_none());
        assert_eq!(p.reason_codes.as_ref().unwrap().len(), 2);
    }
}
