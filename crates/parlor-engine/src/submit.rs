//! Outbound intent envelopes and declared context references.
//!
//! The envelope mirrors the gateway's ingress wire format (snake_case,
//! doubly-nested payload). The same `turn_id`/`correlation_id` pair placed
//! here is what lets the projection re-identify the optimistic local insert
//! when its authoritative echo comes back on the tail.

use serde::{Deserialize, Serialize};

use parlor_core::ids::{CorrelationId, ThreadId, TurnId};

use crate::admission::REQUIRED_INTERFACE_VERSION;
use crate::types::payloads::CHAT_MESSAGE_INTENT;
use crate::types::{ChatMessage, EventKind, MessageRole};

/// Stream the envelope is appended to.
const STREAM_ID: &str = "default";
/// Ingress lane.
const LANE: &str = "user";
/// Actor identifier recorded in the trail.
const ACTOR: &str = "parlor-chat";
/// Principal identifier recorded in the trail.
const PRINCIPAL_ID: &str = "parlor-user";
/// Capability the principal exercises.
const CAPABILITY: &str = "chat";

/// How much prior conversation to declare as context on a send.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContextScope {
    /// Declare nothing; the backend decides.
    #[default]
    None,
    /// Declare the prior turn.
    LastTurn,
    /// Declare a window of the last `n` turns.
    Window(usize),
}

/// A context reference the backend resolves into conversation context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredRef {
    /// Reference kind (always `turn` today).
    pub kind: String,
    /// Thread the referenced turn lives in.
    pub thread_id: ThreadId,
    /// The referenced turn.
    pub turn_id: TurnId,
}

/// Outbound intent envelope (ingress wire format).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentEnvelope {
    /// Interface version the envelope speaks.
    pub interface_version: u32,
    /// Causal-chain identifier, echoed on every resulting trail record.
    pub correlation_id: CorrelationId,
    /// Target thread.
    pub thread_id: ThreadId,
    /// This exchange's turn id.
    pub turn_id: TurnId,
    /// Always [`EventKind::Intent`].
    pub kind: EventKind,
    /// Intent body.
    pub payload: IntentEnvelopePayload,
}

/// Body of an outbound chat intent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentEnvelopePayload {
    /// Stream to append to.
    pub stream_id: String,
    /// Ingress lane.
    pub lane: String,
    /// Acting client identifier.
    pub actor: String,
    /// Logical intent type.
    pub intent_type: String,
    /// Target thread (repeated inside the body for ingress validation).
    pub thread_id: ThreadId,
    /// Turn id (repeated inside the body).
    pub turn_id: TurnId,
    /// Turn this one follows, when the thread has history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_turn_id: Option<TurnId>,
    /// Inner message body.
    pub payload: ChatMessageBody,
    /// Model the sender requests.
    pub requested_model_id: String,
    /// Principal attribution.
    pub inputs: IntentInputs,
    /// Declared context references, when context inclusion was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_refs: Option<Vec<DeclaredRef>>,
}

/// Innermost message body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageBody {
    /// The message text.
    pub message: String,
    /// Model the sender requests (repeated at this depth for older readers).
    pub requested_model_id: String,
}

/// Principal attribution block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentInputs {
    /// Principal identifier.
    pub principal_id: String,
    /// Capability exercised.
    pub capability: String,
    /// Model identifier.
    pub model_id: String,
}

impl IntentEnvelope {
    /// Build a chat-message envelope.
    #[must_use]
    pub fn chat_message(
        thread_id: ThreadId,
        turn_id: TurnId,
        correlation_id: CorrelationId,
        message: &str,
        model_id: &str,
        parent_turn_id: Option<TurnId>,
        declared_refs: Option<Vec<DeclaredRef>>,
    ) -> Self {
        Self {
            interface_version: REQUIRED_INTERFACE_VERSION,
            correlation_id,
            thread_id: thread_id.clone(),
            turn_id: turn_id.clone(),
            kind: EventKind::Intent,
            payload: IntentEnvelopePayload {
                stream_id: STREAM_ID.to_owned(),
                lane: LANE.to_owned(),
                actor: ACTOR.to_owned(),
                intent_type: CHAT_MESSAGE_INTENT.to_owned(),
                thread_id,
                turn_id,
                parent_turn_id,
                payload: ChatMessageBody {
                    message: message.to_owned(),
                    requested_model_id: model_id.to_owned(),
                },
                requested_model_id: model_id.to_owned(),
                inputs: IntentInputs {
                    principal_id: PRINCIPAL_ID.to_owned(),
                    capability: CAPABILITY.to_owned(),
                    model_id: model_id.to_owned(),
                },
                declared_refs,
            },
        }
    }
}

/// Derive declared refs from a thread's projected history.
///
/// Turns are the distinct `turn_id`s of the thread's user messages, oldest
/// first. [`ContextScope::LastTurn`] declares the most recent one;
/// [`ContextScope::Window`] the most recent `n`. Returns `None` when the
/// scope declares nothing or the thread has no prior turns.
#[must_use]
pub fn declared_refs_for(
    scope: ContextScope,
    thread_id: &ThreadId,
    messages: &[ChatMessage],
) -> Option<Vec<DeclaredRef>> {
    let window = match scope {
        ContextScope::None => return None,
        ContextScope::LastTurn => 1,
        ContextScope::Window(n) => n,
    };
    if window == 0 {
        return None;
    }

    let mut turns: Vec<&TurnId> = Vec::new();
    for message in messages {
        if message.role != MessageRole::User {
            continue;
        }
        if let Some(turn_id) = message.turn_id.as_ref() {
            if !turns.contains(&turn_id) {
                turns.push(turn_id);
            }
        }
    }

    let refs: Vec<DeclaredRef> = turns
        .into_iter()
        .rev()
        .take(window)
        .rev()
        .map(|turn_id| DeclaredRef {
            kind: "turn".to_owned(),
            thread_id: thread_id.clone(),
            turn_id: turn_id.clone(),
        })
        .collect();

    (!refs.is_empty()).then_some(refs)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
