//! The reconciliation controller: snapshot replay, then a restartable tail
//! subscription, feeding every record through the ledger→reducer pipeline.
//!
//! One logical owner processes one record at a time to completion. The
//! ledger and the reducer sit behind a single mutual-exclusion region
//! ([`ProjectionHandle`]) so hosts with real parallelism get the same
//! serialization the design assumes. Consumers take short read locks for
//! snapshots and watch a revision counter for change notification.
//!
//! Recovery never needs offsets: the tail is reopened from scratch after a
//! fixed backoff and may re-deliver history; the idempotent pipeline absorbs
//! the replay.

use std::sync::Arc;

use futures::StreamExt;
use metrics::counter;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use parlor_core::ids::ThreadId;
use parlor_core::retry::ReconnectPolicy;

use crate::ledger::{DEFAULT_LEDGER_CAPACITY, DedupeLedger};
use crate::projection::{Applied, ProjectionState};
use crate::source::EventSource;
use crate::types::{ChatMessage, DedupeKey, EventRecord};

/// Liveness of the tail subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TailState {
    /// Initial snapshot replay; the tail has not been opened yet.
    Catchup,
    /// The live subscription is open.
    Live,
    /// The subscription dropped; waiting out the backoff before reopening.
    Reconnecting,
}

/// Controller tuning.
#[derive(Clone, Copy, Debug)]
pub struct ControllerConfig {
    /// Snapshot start offset.
    pub snapshot_offset: u64,
    /// Snapshot batch size.
    pub snapshot_limit: u64,
    /// Tail reopen policy.
    pub reconnect: ReconnectPolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            snapshot_offset: 0,
            snapshot_limit: 2000,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Ledger + reducer behind one lock — the single mutual-exclusion region.
struct Pipeline {
    ledger: DedupeLedger,
    projection: ProjectionState,
}

/// Sidebar-grade snapshot of one projected thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadOverview {
    /// Thread identifier.
    pub id: ThreadId,
    /// Content of the first projected message, for title derivation.
    pub first_content: Option<String>,
    /// Timestamp of the latest projected message.
    pub last_update: Option<String>,
}

/// Shared handle over the admission+projection pipeline.
///
/// Cloning is cheap; all clones see the same state. Every mutation bumps a
/// revision counter observable through [`subscribe`](Self::subscribe).
#[derive(Clone)]
pub struct ProjectionHandle {
    inner: Arc<Mutex<Pipeline>>,
    revision: Arc<watch::Sender<u64>>,
}

impl ProjectionHandle {
    /// Create an empty pipeline with the given ledger capacity.
    #[must_use]
    pub fn new(ledger_capacity: usize) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(Pipeline {
                ledger: DedupeLedger::new(ledger_capacity),
                projection: ProjectionState::new(),
            })),
            revision: Arc::new(revision),
        }
    }

    /// Create an empty pipeline with the default ledger capacity.
    #[must_use]
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_LEDGER_CAPACITY)
    }

    /// Run one record through admission and reduction.
    pub fn apply_record(&self, record: &EventRecord) -> Applied {
        let applied = {
            let mut pipeline = self.inner.lock();
            if !pipeline.ledger.admit(DedupeKey::derive(record)) {
                counter!("projection_duplicates_total").increment(1);
                return Applied::Ignored;
            }
            pipeline.projection.apply(record)
        };
        match applied {
            Applied::Projected => {
                counter!("projection_applied_total").increment(1);
                self.bump();
            }
            Applied::Failed => counter!("projection_failures_total").increment(1),
            Applied::Ignored => {}
        }
        applied
    }

    /// Insert an optimistic local message (outbound send path).
    pub fn insert_local(&self, thread_id: &ThreadId, message: ChatMessage) {
        self.inner.lock().projection.insert_local(thread_id, message);
        self.bump();
    }

    /// Mark one message `transport_error` after a failed send.
    pub fn mark_transport_error(&self, thread_id: &ThreadId, message_id: &str) -> bool {
        let found = self
            .inner
            .lock()
            .projection
            .mark_transport_error(thread_id, message_id);
        if found {
            self.bump();
        }
        found
    }

    /// Snapshot of one thread's messages.
    #[must_use]
    pub fn messages(&self, thread_id: &ThreadId) -> Vec<ChatMessage> {
        self.inner.lock().projection.messages(thread_id).to_vec()
    }

    /// Snapshot of every projected thread.
    #[must_use]
    pub fn thread_overviews(&self) -> Vec<ThreadOverview> {
        let pipeline = self.inner.lock();
        pipeline
            .projection
            .threads()
            .map(|(id, messages)| ThreadOverview {
                id: id.clone(),
                first_content: messages.first().map(|m| m.content.clone()),
                last_update: messages.last().map(|m| m.timestamp.clone()),
            })
            .collect()
    }

    /// Whether the last applied record failed to reduce.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.inner.lock().projection.is_degraded()
    }

    /// Number of keys resident in the dedupe ledger.
    #[must_use]
    pub fn ledger_len(&self) -> usize {
        self.inner.lock().ledger.len()
    }

    /// Watch the revision counter (bumped on every visible mutation).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
    }
}

/// Drives snapshot replay and the tail restart loop against the pipeline.
pub struct ReconcileController {
    projection: ProjectionHandle,
    source: Arc<dyn EventSource>,
    config: ControllerConfig,
    cancel: CancellationToken,
    tail_tx: Arc<watch::Sender<TailState>>,
}

impl ReconcileController {
    /// Create a controller. Nothing runs until [`spawn`](Self::spawn).
    #[must_use]
    pub fn new(
        projection: ProjectionHandle,
        source: Arc<dyn EventSource>,
        config: ControllerConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (tail_tx, _) = watch::channel(TailState::Catchup);
        Self {
            projection,
            source,
            config,
            cancel,
            tail_tx: Arc::new(tail_tx),
        }
    }

    /// Watch the tail liveness indicator.
    #[must_use]
    pub fn tail_state(&self) -> watch::Receiver<TailState> {
        self.tail_tx.subscribe()
    }

    /// Run the controller on a background task until cancellation.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        self.replay_snapshot().await;

        while !self.cancel.is_cancelled() {
            let subscription = tokio::select! {
                () = self.cancel.cancelled() => return,
                result = self.source.subscribe_tail(None) => result,
            };

            match subscription {
                Ok(mut stream) => {
                    let _ = self.tail_tx.send_replace(TailState::Live);
                    debug!("tail subscription open");
                    loop {
                        tokio::select! {
                            () = self.cancel.cancelled() => return,
                            item = stream.next() => match item {
                                Some(Ok(record)) => {
                                    let _ = self.projection.apply_record(&record);
                                }
                                Some(Err(error)) => {
                                    warn!(%error, "tail read failed");
                                    break;
                                }
                                None => {
                                    debug!("tail ended");
                                    break;
                                }
                            }
                        }
                    }
                }
                Err(error) => warn!(%error, "tail subscription failed"),
            }

            let _ = self.tail_tx.send_replace(TailState::Reconnecting);
            counter!("tail_reconnects_total").increment(1);
            tokio::select! {
                () = self.cancel.cancelled() => return,
                () = tokio::time::sleep(self.config.reconnect.backoff) => {}
            }
        }
    }

    /// Fetch and replay the historical batch.
    ///
    /// A failed fetch is tolerated: the offset-less tail re-delivers history
    /// and the idempotent pipeline converges to the same state.
    async fn replay_snapshot(&self) {
        let fetched = tokio::select! {
            () = self.cancel.cancelled() => return,
            result = self
                .source
                .fetch_snapshot(self.config.snapshot_offset, self.config.snapshot_limit) => result,
        };
        match fetched {
            Ok(page) => {
                debug!(
                    count = page.events.len(),
                    total = page.length,
                    "replaying snapshot"
                );
                for record in &page.events {
                    if self.cancel.is_cancelled() {
                        return;
                    }
                    let _ = self.projection.apply_record(record);
                }
            }
            Err(error) => warn!(%error, "snapshot fetch failed; relying on tail replay"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SourceError;
    use crate::source::{RecordStream, SnapshotPage};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::time::Duration;

    fn intent(thread: &str, turn: &str, message: &str, index: u64) -> EventRecord {
        serde_json::from_value(json!({
            "kind": "INTENT",
            "thread_id": thread,
            "turn_id": turn,
            "correlation_id": format!("corr-{turn}"),
            "index": index,
            "timestamp": "2026-01-01T00:00:01Z",
            "payload": {"intent_type": "chat.message", "payload": {"message": message}}
        }))
        .unwrap()
    }

    fn execution(thread: &str, corr: &str, text: &str, index: u64) -> EventRecord {
        serde_json::from_value(json!({
            "kind": "EXECUTION",
            "thread_id": thread,
            "correlation_id": corr,
            "index": index,
            "timestamp": "2026-01-01T00:00:02Z",
            "payload": {"output_text": text}
        }))
        .unwrap()
    }

    /// Source whose snapshot is fixed and whose tail yields one scripted
    /// batch per subscription, then ends (provoking a reconnect). When the
    /// scripts run out, the tail stays open forever without yielding.
    struct ScriptedSource {
        snapshot: SnapshotPage,
        tails: Mutex<VecDeque<Vec<Result<EventRecord, SourceError>>>>,
    }

    #[async_trait]
    impl EventSource for ScriptedSource {
        async fn fetch_snapshot(&self, _: u64, _: u64) -> Result<SnapshotPage, SourceError> {
            Ok(self.snapshot.clone())
        }

        async fn subscribe_tail(&self, _: Option<u64>) -> Result<RecordStream, SourceError> {
            match self.tails.lock().pop_front() {
                Some(batch) => Ok(Box::pin(futures::stream::iter(batch))),
                None => Ok(Box::pin(futures::stream::pending::<
                    Result<EventRecord, SourceError>,
                >())),
            }
        }
    }

    fn fast_config() -> ControllerConfig {
        ControllerConfig {
            reconnect: ReconnectPolicy::with_backoff(Duration::from_millis(1)),
            ..ControllerConfig::default()
        }
    }

    async fn wait_until(
        rx: &mut watch::Receiver<u64>,
        handle: &ProjectionHandle,
        predicate: impl Fn(&ProjectionHandle) -> bool,
    ) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !predicate(handle) {
                rx.changed().await.expect("revision channel closed");
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn snapshot_and_tail_overlap_produces_no_duplicates() {
        let a = intent("t1", "u1", "hi", 1);
        let b = execution("t1", "corr-u1", "hello back", 2);
        let source = Arc::new(ScriptedSource {
            snapshot: SnapshotPage {
                events: vec![a.clone()],
                length: 1,
            },
            // First tail re-delivers the snapshot record, adds one, then
            // drops; the second tail replays everything again.
            tails: Mutex::new(VecDeque::from(vec![
                vec![Ok(a.clone()), Ok(b.clone())],
                vec![Ok(a.clone()), Ok(b.clone())],
            ])),
        });

        let handle = ProjectionHandle::with_default_capacity();
        let mut rx = handle.subscribe();
        let cancel = CancellationToken::new();
        let controller =
            ReconcileController::new(handle.clone(), source, fast_config(), cancel.clone());
        let worker = controller.spawn();

        wait_until(&mut rx, &handle, |h| {
            h.messages(&"t1".into()).len() == 2 && h.ledger_len() == 2
        })
        .await;

        // Give the second replay a chance to run, then confirm idempotence.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let messages = handle.messages(&"t1".into());
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].content, "hello back");

        cancel.cancel();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn tail_error_reconnects_and_recovers() {
        let a = intent("t1", "u1", "hi", 1);
        let b = execution("t1", "corr-u1", "after reconnect", 2);
        let source = Arc::new(ScriptedSource {
            snapshot: SnapshotPage::default(),
            tails: Mutex::new(VecDeque::from(vec![
                vec![
                    Ok(a.clone()),
                    Err(SourceError::Transport("connection reset".into())),
                ],
                vec![Ok(a.clone()), Ok(b.clone())],
            ])),
        });

        let handle = ProjectionHandle::with_default_capacity();
        let mut rx = handle.subscribe();
        let cancel = CancellationToken::new();
        let controller =
            ReconcileController::new(handle.clone(), source, fast_config(), cancel.clone());
        let worker = controller.spawn();

        wait_until(&mut rx, &handle, |h| h.messages(&"t1".into()).len() == 2).await;

        cancel.cancel();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn tail_state_reports_reconnecting() {
        let source = Arc::new(ScriptedSource {
            snapshot: SnapshotPage::default(),
            tails: Mutex::new(VecDeque::from(vec![vec![]])),
        });

        let handle = ProjectionHandle::with_default_capacity();
        let cancel = CancellationToken::new();
        // A wide backoff keeps the Reconnecting state observable.
        let config = ControllerConfig {
            reconnect: ReconnectPolicy::with_backoff(Duration::from_millis(50)),
            ..ControllerConfig::default()
        };
        let controller = ReconcileController::new(handle, source, config, cancel.clone());
        let mut tail_rx = controller.tail_state();
        let worker = controller.spawn();

        // Catchup → Live → (stream ends) → Reconnecting → Live again.
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if *tail_rx.borrow() == TailState::Reconnecting {
                    break;
                }
                tail_rx.changed().await.unwrap();
            }
            loop {
                if *tail_rx.borrow() == TailState::Live {
                    break;
                }
                tail_rx.changed().await.unwrap();
            }
        })
        .await
        .expect("tail state never cycled");

        cancel.cancel();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop() {
        let source = Arc::new(ScriptedSource {
            snapshot: SnapshotPage::default(),
            tails: Mutex::new(VecDeque::new()),
        });

        let handle = ProjectionHandle::with_default_capacity();
        let cancel = CancellationToken::new();
        let controller =
            ReconcileController::new(handle, source, fast_config(), cancel.clone());
        let worker = controller.spawn();

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .expect("controller did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn handle_revision_bumps_on_local_insert() {
        let handle = ProjectionHandle::with_default_capacity();
        let rx = handle.subscribe();
        let before = *rx.borrow();
        handle.insert_local(
            &"t1".into(),
            ChatMessage {
                id: "u1".into(),
                role: crate::types::MessageRole::User,
                content: "hi".into(),
                timestamp: "2026-01-01T00:00:00Z".into(),
                turn_id: Some("u1".into()),
                correlation_id: Some("c1".into()),
                status: crate::types::MessageStatus::ObservedIntent,
                decision: None,
            },
        );
        assert!(*rx.borrow() > before);
        assert!(handle.mark_transport_error(&"t1".into(), "u1"));
    }
}
