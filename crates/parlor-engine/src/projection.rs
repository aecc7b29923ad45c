//! The projection reducer: folds accepted trail records into per-thread
//! message lists.
//!
//! Reduction is deterministic and idempotent: applying the same record twice
//! leaves the same state as applying it once. Records are applied strictly in
//! delivery order — the reducer never reorders by `index` or `timestamp`, so
//! an execution observed before its intent stays an orphaned-but-visible
//! assistant message (accepted behavior).
//!
//! A record that fails to reduce is skipped and raises the sticky degraded
//! flag; the flag clears on the next record that reduces cleanly. One
//! malformed record degrades visibility, never availability.

use std::collections::HashMap;

use tracing::warn;

use parlor_core::ids::{ThreadId, TurnId};

use crate::errors::ProjectionError;
use crate::types::{
    ChatMessage, DecisionMetadata, DecisionPayload, EventPayload, EventRecord, ExecutionPayload,
    IntentPayload, MessageRole, MessageStatus,
};

/// Outcome of feeding one record to the reducer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// The record changed the projected state.
    Projected,
    /// The record was well-formed but produced no visible effect
    /// (unattributable, non-chat intent, ALLOW decision, already present…).
    Ignored,
    /// The record could not be reduced and was skipped; the degraded flag
    /// is now raised.
    Failed,
}

/// Per-thread projected conversation state.
#[derive(Debug, Default)]
pub struct ProjectionState {
    threads: HashMap<ThreadId, Vec<ChatMessage>>,
    degraded: bool,
}

impl ProjectionState {
    /// Create an empty projection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one trail record.
    ///
    /// Never panics and never propagates an error: a failing record is
    /// skipped and reported through [`Applied::Failed`] and
    /// [`is_degraded`](Self::is_degraded).
    pub fn apply(&mut self, record: &EventRecord) -> Applied {
        match self.reduce(record) {
            Ok(applied) => {
                self.degraded = false;
                applied
            }
            Err(error) => {
                warn!(kind = record.kind.as_str(), %error, "skipping unreducible event");
                self.degraded = true;
                Applied::Failed
            }
        }
    }

    fn reduce(&mut self, record: &EventRecord) -> Result<Applied, ProjectionError> {
        // Unattributable records cannot affect any conversation.
        let Some(thread_id) = record.thread_id.clone() else {
            return Ok(Applied::Ignored);
        };
        let timestamp = record
            .timestamp
            .clone()
            .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());

        match record.typed_payload()? {
            EventPayload::Intent(payload) => {
                Ok(self.reduce_intent(&thread_id, record, &payload, timestamp))
            }
            EventPayload::Execution(payload) => {
                Ok(self.reduce_execution(&thread_id, record, &payload, timestamp))
            }
            EventPayload::Decision(payload) => {
                Ok(self.reduce_decision(&thread_id, record, &payload, timestamp))
            }
            EventPayload::Other(_) => Ok(Applied::Ignored),
        }
    }

    /// Project an intent: heal the correlated message if one exists
    /// (optimistic insert meeting its authoritative echo), else append a new
    /// user message.
    fn reduce_intent(
        &mut self,
        thread_id: &ThreadId,
        record: &EventRecord,
        payload: &IntentPayload,
        timestamp: String,
    ) -> Applied {
        if !payload.is_chat_message() {
            return Applied::Ignored;
        }
        let Some(content) = payload.message_text() else {
            return Applied::Ignored;
        };

        let turn_id = record.turn_id.as_ref();
        let correlation_id = record.correlation_id.as_ref();
        let messages = self.threads.entry(thread_id.clone()).or_default();

        let mut matched = false;
        for message in messages.iter_mut() {
            if message.correlates_with(turn_id, correlation_id) {
                message.content = content.to_owned();
                message.timestamp = timestamp.clone();
                message.status = MessageStatus::ObservedIntent;
                matched = true;
            }
        }
        if matched {
            return Applied::Projected;
        }

        let id = turn_id.map(ToString::to_string).unwrap_or_else(|| {
            correlation_id.map_or_else(
                || {
                    record
                        .event_id
                        .clone()
                        .unwrap_or_else(|| TurnId::generate().to_string())
                },
                ToString::to_string,
            )
        });
        messages.push(ChatMessage {
            id,
            role: MessageRole::User,
            content: content.to_owned(),
            timestamp,
            turn_id: record.turn_id.clone(),
            correlation_id: record.correlation_id.clone(),
            status: MessageStatus::ObservedIntent,
            decision: None,
        });
        Applied::Projected
    }

    /// Project an execution outcome as an assistant message.
    ///
    /// The `-exec` identity check is defense in depth beyond the ledger: a
    /// redelivered record whose dedupe key already fell out of the admission
    /// window must still be a no-op here.
    fn reduce_execution(
        &mut self,
        thread_id: &ThreadId,
        record: &EventRecord,
        payload: &ExecutionPayload,
        timestamp: String,
    ) -> Applied {
        let Some(correlation_id) = record.correlation_id.as_ref() else {
            return Applied::Ignored;
        };
        let exec_id = format!("{correlation_id}-exec");
        if self
            .threads
            .get(thread_id)
            .is_some_and(|messages| messages.iter().any(|m| m.id == exec_id))
        {
            return Applied::Ignored;
        }

        // Partial execution records (no resolvable content) are not shown.
        let Some((content, status)) = payload.resolve_content() else {
            return Applied::Ignored;
        };

        self.threads
            .entry(thread_id.clone())
            .or_default()
            .push(ChatMessage {
                id: exec_id,
                role: MessageRole::Assistant,
                content,
                timestamp,
                turn_id: record.turn_id.clone(),
                correlation_id: record.correlation_id.clone(),
                status,
                decision: None,
            });
        Applied::Projected
    }

    /// Project a denial: flip the correlated user message to `observed_deny`
    /// and append a system notice carrying the decision metadata. ALLOW
    /// verdicts need no visible confirmation.
    fn reduce_decision(
        &mut self,
        thread_id: &ThreadId,
        record: &EventRecord,
        payload: &DecisionPayload,
        timestamp: String,
    ) -> Applied {
        if !payload.is_deny() {
            return Applied::Ignored;
        }
        let Some(correlation_id) = record.correlation_id.as_ref() else {
            return Applied::Ignored;
        };
        let deny_id = format!("{correlation_id}-deny");
        if self
            .threads
            .get(thread_id)
            .is_some_and(|messages| messages.iter().any(|m| m.id == deny_id))
        {
            return Applied::Ignored;
        }

        let messages = self.threads.entry(thread_id.clone()).or_default();
        for message in messages.iter_mut() {
            if message.role == MessageRole::User
                && message.correlates_with(record.turn_id.as_ref(), Some(correlation_id))
            {
                message.status = MessageStatus::ObservedDeny;
            }
        }

        let reason = payload
            .reason
            .clone()
            .unwrap_or_else(|| "Policy check failed".to_owned());
        let metadata = DecisionMetadata {
            context_digest: payload.context_digest.clone(),
            decision_digest: payload.decision_digest.clone(),
            reason_codes: payload.reason_codes.clone(),
        };
        messages.push(ChatMessage {
            id: deny_id,
            role: MessageRole::System,
            content: format!("Decision: DENY - {reason}"),
            timestamp,
            turn_id: record.turn_id.clone(),
            correlation_id: record.correlation_id.clone(),
            status: MessageStatus::ObservedDeny,
            decision: (!metadata.is_empty()).then_some(metadata),
        });
        Applied::Projected
    }

    /// Insert an optimistic local message (outbound send path).
    pub fn insert_local(&mut self, thread_id: &ThreadId, message: ChatMessage) {
        self.threads.entry(thread_id.clone()).or_default().push(message);
    }

    /// Mark one message `transport_error` after a failed send.
    ///
    /// Returns whether the message was found.
    pub fn mark_transport_error(&mut self, thread_id: &ThreadId, message_id: &str) -> bool {
        let Some(messages) = self.threads.get_mut(thread_id) else {
            return false;
        };
        let Some(message) = messages.iter_mut().find(|m| m.id == message_id) else {
            return false;
        };
        message.status = MessageStatus::TransportError;
        true
    }

    /// Messages of one thread, in projection order.
    #[must_use]
    pub fn messages(&self, thread_id: &ThreadId) -> &[ChatMessage] {
        self.threads.get(thread_id).map_or(&[], Vec::as_slice)
    }

    /// All threads with their messages.
    pub fn threads(&self) -> impl Iterator<Item = (&ThreadId, &[ChatMessage])> {
        self.threads.iter().map(|(id, msgs)| (id, msgs.as_slice()))
    }

    /// Whether the last applied record failed to reduce.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
