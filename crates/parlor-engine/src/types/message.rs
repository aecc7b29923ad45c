//! Projected message and thread state types.
//!
//! These are owned exclusively by the projection reducer; consumers (the
//! view layer) only read them. Serialization is camelCase like the rest of
//! the client-facing state surface.

use serde::{Deserialize, Serialize};

use parlor_core::ids::{CorrelationId, ThreadId, TurnId};

/// Author role of a projected message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// The human sender.
    User,
    /// The model's execution output.
    Assistant,
    /// Engine-synthesized notices (denials).
    System,
}

/// Lifecycle status of a projected message.
///
/// `pending → observed_intent → {observed_execution | execution_error |
/// observed_deny}`; independently `pending → transport_error` when the
/// outbound send fails. No transition ever reverts to `pending`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Optimistic local insert, not yet echoed by the trail.
    Pending,
    /// The authoritative intent echo has been observed.
    ObservedIntent,
    /// The turn's execution completed and produced output.
    ObservedExecution,
    /// The turn's execution failed.
    ExecutionError,
    /// Policy denied the turn.
    ObservedDeny,
    /// The outbound send never reached the gateway. Terminal; never retried.
    TransportError,
}

impl MessageStatus {
    /// Whether no further trail events are expected for this message.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::ObservedExecution | Self::ExecutionError | Self::ObservedDeny | Self::TransportError
        )
    }
}

/// Decision metadata carried forward onto denial notices for inspection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionMetadata {
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

impl DecisionMetadata {
    /// Whether any field is populated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.context_digest.is_none() && self.decision_digest.is_none() && self.reason_codes.is_none()
    }
}

/// One projected chat message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Stable identity: the turn id for user messages, the correlation id
    /// suffixed `-exec`/`-deny` for assistant/system messages.
    pub id: String,
    /// Author role.
    pub role: MessageRole,
    /// Display content.
    pub content: String,
    /// ISO 8601 timestamp.
    pub timestamp: String,
    /// Turn this message belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<TurnId>,
    /// Causal chain this message belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    /// Lifecycle status.
    pub status: MessageStatus,
    /// Decision metadata, present only on denial notices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<DecisionMetadata>,
}

impl ChatMessage {
    /// Whether this message belongs to the exchange identified by either id.
    ///
    /// A match requires the *event* side to carry the id — two absent ids
    /// never correlate.
    #[must_use]
    pub fn correlates_with(
        &self,
        turn_id: Option<&TurnId>,
        correlation_id: Option<&CorrelationId>,
    ) -> bool {
        turn_id.is_some_and(|t| self.turn_id.as_ref() == Some(t))
            || correlation_id.is_some_and(|c| self.correlation_id.as_ref() == Some(c))
    }
}

/// Sidebar summary of one visible thread.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadSummary {
    /// Thread identifier.
    pub id: ThreadId,
    /// Display title: custom title, else derived from the first message.
    pub title: String,
    /// Timestamp of the latest activity, for descending sort.
    pub last_update: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
