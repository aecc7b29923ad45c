//! The consumer-facing chat session.
//!
//! [`ChatSession`] ties the pieces together: the admission gate runs once at
//! activation, the reconciliation controller is spawned against the shared
//! projection, and user sends go out as intent envelopes after an optimistic
//! local insert. The view layer only ever reads projected state snapshots
//! and watches the revision counter.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use parlor_core::ids::{CorrelationId, ThreadId, TurnId};
use parlor_core::retry::ReconnectPolicy;
use parlor_core::text::truncate_str;

use crate::admission::{self, Capabilities};
use crate::controller::{ControllerConfig, ProjectionHandle, ReconcileController, TailState};
use crate::errors::{AdmissionError, SendError};
use crate::ledger::DEFAULT_LEDGER_CAPACITY;
use crate::prefs::{PrefsStore, ThreadPrefs};
use crate::source::{CapabilitiesProbe, EventSource, IntentSink};
use crate::submit::{ContextScope, IntentEnvelope, declared_refs_for};
use crate::types::{ChatMessage, MessageRole, MessageStatus, ThreadSummary};

/// Title shown for threads with no content and no custom title.
const DEFAULT_THREAD_TITLE: &str = "New Thread";
/// Byte budget for titles derived from the first message.
const DERIVED_TITLE_BYTES: usize = 30;

/// Session lifecycle state.
///
/// Only the admission path moves this: transient tail drops are reported
/// through [`TailState`], not here, so sends stay possible while the tail
/// recovers (ingress is independent of the subscription).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, not yet activated.
    Disconnected,
    /// Probing the gateway.
    Connecting,
    /// Admission passed; capabilities being adopted.
    CheckingCapabilities,
    /// Admitted and operating.
    Connected,
    /// Admission failed — terminal for this session.
    Failed,
}

/// The transport collaborators a session consumes.
#[derive(Clone)]
pub struct SessionBackend {
    /// Read side of the trail.
    pub source: Arc<dyn EventSource>,
    /// Outbound intent ingress.
    pub sink: Arc<dyn IntentSink>,
    /// Startup capabilities probe.
    pub probe: Arc<dyn CapabilitiesProbe>,
}

/// Session tuning.
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    /// Snapshot batch size for initial catch-up.
    pub snapshot_limit: u64,
    /// Dedupe ledger capacity.
    pub ledger_capacity: usize,
    /// Tail reopen policy.
    pub reconnect: ReconnectPolicy,
    /// Context declared on outbound sends.
    pub context: ContextScope,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            snapshot_limit: 2000,
            ledger_capacity: DEFAULT_LEDGER_CAPACITY,
            reconnect: ReconnectPolicy::default(),
            context: ContextScope::default(),
        }
    }
}

/// A live multi-thread chat session against one gateway.
pub struct ChatSession {
    backend: SessionBackend,
    config: SessionConfig,
    projection: ProjectionHandle,
    prefs: ThreadPrefs,
    capabilities: RwLock<Option<Capabilities>>,
    selected_model: Mutex<Option<String>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
    tail_rx: Mutex<Option<watch::Receiver<TailState>>>,
    /// Locally created threads that have no projected messages yet.
    local_threads: Mutex<Vec<(ThreadId, String)>>,
}

impl ChatSession {
    /// Create a session. Nothing touches the network until
    /// [`activate`](Self::activate).
    #[must_use]
    pub fn new(backend: SessionBackend, store: Arc<dyn PrefsStore>, config: SessionConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            backend,
            config,
            projection: ProjectionHandle::new(config.ledger_capacity),
            prefs: ThreadPrefs::new(store),
            capabilities: RwLock::new(None),
            selected_model: Mutex::new(None),
            state_tx: Arc::new(state_tx),
            cancel: CancellationToken::new(),
            worker: Mutex::new(None),
            tail_rx: Mutex::new(None),
            local_threads: Mutex::new(Vec::new()),
        }
    }

    /// Create and activate in one step.
    pub async fn connect(
        backend: SessionBackend,
        store: Arc<dyn PrefsStore>,
        config: SessionConfig,
    ) -> Result<Self, AdmissionError> {
        let session = Self::new(backend, store, config);
        session.activate().await?;
        Ok(session)
    }

    /// Run the admission gate and start the reconciliation controller.
    ///
    /// Fails hard on an incompatible gateway — admission failures are fatal
    /// to the session, never retried. Calling on an already-active session
    /// is a no-op.
    pub async fn activate(&self) -> Result<(), AdmissionError> {
        let started = self.state_tx.send_if_modified(|state| {
            if *state == ConnectionState::Disconnected {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });
        if !started {
            return Ok(());
        }
        let capabilities = match self.backend.probe.capabilities().await {
            Ok(caps) => caps,
            Err(error) => {
                let _ = self.state_tx.send_replace(ConnectionState::Failed);
                return Err(error);
            }
        };
        if let Err(error) = admission::evaluate(&capabilities) {
            warn!(%error, "admission gate refused the gateway");
            let _ = self.state_tx.send_replace(ConnectionState::Failed);
            return Err(error);
        }

        let _ = self
            .state_tx
            .send_replace(ConnectionState::CheckingCapabilities);
        {
            let mut selected = self.selected_model.lock();
            if selected.is_none() {
                *selected = capabilities.default_model().map(str::to_owned);
            }
        }
        *self.capabilities.write() = Some(capabilities);

        let controller = ReconcileController::new(
            self.projection.clone(),
            Arc::clone(&self.backend.source),
            ControllerConfig {
                snapshot_offset: 0,
                snapshot_limit: self.config.snapshot_limit,
                reconnect: self.config.reconnect,
            },
            self.cancel.clone(),
        );
        *self.tail_rx.lock() = Some(controller.tail_state());
        *self.worker.lock() = Some(controller.spawn());

        let _ = self.state_tx.send_replace(ConnectionState::Connected);
        info!("session connected");
        Ok(())
    }

    // ── Outbound ─────────────────────────────────────────────────────────

    /// Send a chat message on a thread.
    ///
    /// Preconditions (connected, model selected, non-empty text) fail
    /// *before* any side effect — no optimistic insert, no submission. After
    /// the optimistic insert, a transport failure is not an `Err`: it is
    /// recorded as `transport_error` on exactly that message and never
    /// retried.
    pub async fn send_message(
        &self,
        thread_id: &ThreadId,
        text: &str,
    ) -> Result<TurnId, SendError> {
        if self.connection_state() != ConnectionState::Connected {
            return Err(SendError::NotConnected);
        }
        let model = self
            .selected_model
            .lock()
            .clone()
            .ok_or(SendError::NoModelSelected)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SendError::EmptyMessage);
        }

        // Sending into a hidden thread resurfaces it.
        let _ = self.prefs.unhide(thread_id);

        let turn_id = TurnId::generate();
        let correlation_id = CorrelationId::generate();
        let timestamp = chrono::Utc::now().to_rfc3339();

        let existing = self.projection.messages(thread_id);
        let parent_turn_id = existing.last().and_then(|m| m.turn_id.clone());
        let declared_refs = declared_refs_for(self.config.context, thread_id, &existing);

        // Inserted as observed_intent directly, not a separate pending
        // visual state, so the authoritative echo heals in place without a
        // flash/merge artifact.
        self.projection.insert_local(
            thread_id,
            ChatMessage {
                id: turn_id.to_string(),
                role: MessageRole::User,
                content: text.to_owned(),
                timestamp,
                turn_id: Some(turn_id.clone()),
                correlation_id: Some(correlation_id.clone()),
                status: MessageStatus::ObservedIntent,
                decision: None,
            },
        );

        let envelope = IntentEnvelope::chat_message(
            thread_id.clone(),
            turn_id.clone(),
            correlation_id,
            text,
            &model,
            parent_turn_id,
            declared_refs,
        );
        if let Err(error) = self.backend.sink.submit_intent(&envelope).await {
            warn!(%error, turn_id = %turn_id, "intent submission failed");
            let _ = self
                .projection
                .mark_transport_error(thread_id, turn_id.as_str());
        }
        Ok(turn_id)
    }

    // ── Threads ──────────────────────────────────────────────────────────

    /// Messages of one thread, in projection order.
    #[must_use]
    pub fn messages(&self, thread_id: &ThreadId) -> Vec<ChatMessage> {
        self.projection.messages(thread_id)
    }

    /// Visible threads, newest activity first.
    ///
    /// Projected threads minus locally hidden ones, plus locally created
    /// threads that have no messages yet. Titles: custom title, else the
    /// first message truncated, else the default.
    #[must_use]
    pub fn threads(&self) -> Vec<ThreadSummary> {
        let hidden = self.prefs.hidden();
        let overviews = self.projection.thread_overviews();
        let projected: HashSet<String> = overviews
            .iter()
            .map(|o| o.id.as_str().to_owned())
            .collect();

        let mut summaries: Vec<ThreadSummary> = overviews
            .into_iter()
            .filter(|o| !hidden.contains(o.id.as_str()))
            .map(|o| {
                let title = self
                    .prefs
                    .title(&o.id)
                    .or_else(|| {
                        o.first_content
                            .as_deref()
                            .map(|c| truncate_str(c, DERIVED_TITLE_BYTES).to_owned())
                            .filter(|t| !t.is_empty())
                    })
                    .unwrap_or_else(|| DEFAULT_THREAD_TITLE.to_owned());
                ThreadSummary {
                    id: o.id,
                    title,
                    last_update: o.last_update.unwrap_or_default(),
                }
            })
            .collect();

        for (thread_id, created_at) in self.local_threads.lock().iter() {
            if hidden.contains(thread_id.as_str()) || projected.contains(thread_id.as_str()) {
                continue;
            }
            summaries.push(ThreadSummary {
                id: thread_id.clone(),
                title: self
                    .prefs
                    .title(thread_id)
                    .unwrap_or_else(|| DEFAULT_THREAD_TITLE.to_owned()),
                last_update: created_at.clone(),
            });
        }

        summaries.sort_by(|a, b| b.last_update.cmp(&a.last_update));
        summaries
    }

    /// Create a new local thread (visible immediately, no messages yet).
    pub fn create_thread(&self) -> ThreadId {
        let thread_id = ThreadId::generate();
        self.local_threads
            .lock()
            .push((thread_id.clone(), chrono::Utc::now().to_rfc3339()));
        thread_id
    }

    /// Hide a thread locally. The trail is never mutated.
    pub fn hide_thread(&self, thread_id: &ThreadId) {
        self.prefs.hide(thread_id);
        self.local_threads.lock().retain(|(id, _)| id != thread_id);
    }

    /// Set a custom thread title.
    pub fn rename_thread(&self, thread_id: &ThreadId, title: &str) {
        self.prefs.set_title(thread_id, title);
    }

    // ── Models ───────────────────────────────────────────────────────────

    /// The currently selected model.
    #[must_use]
    pub fn selected_model(&self) -> Option<String> {
        self.selected_model.lock().clone()
    }

    /// Select a model for subsequent sends.
    pub fn set_model(&self, model_id: impl Into<String>) {
        *self.selected_model.lock() = Some(model_id.into());
    }

    /// Gateway capabilities adopted at admission.
    #[must_use]
    pub fn capabilities(&self) -> Option<Capabilities> {
        self.capabilities.read().clone()
    }

    // ── Observation ──────────────────────────────────────────────────────

    /// Current lifecycle state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Watch lifecycle state changes.
    #[must_use]
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Watch the projection revision counter.
    #[must_use]
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.projection.subscribe()
    }

    /// Watch tail liveness, once active.
    #[must_use]
    pub fn watch_tail(&self) -> Option<watch::Receiver<TailState>> {
        self.tail_rx.lock().clone()
    }

    /// Whether the last applied record failed to reduce.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.projection.is_degraded()
    }

    // ── Teardown ─────────────────────────────────────────────────────────

    /// Stop the controller and detach from the gateway.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(error) = worker.await {
                warn!(%error, "controller task aborted");
            }
        }
        let _ = self.state_tx.send_replace(ConnectionState::Disconnected);
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
