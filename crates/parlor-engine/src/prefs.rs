//! Local thread preferences: custom titles and hidden-thread flags.
//!
//! These are presentation-local facts — hiding a thread is never a log
//! mutation. They live behind an injected key-value collaborator so the
//! engine stays testable without any real persistence backing:
//!
//! - [`MemoryPrefs`] — ephemeral, for tests and throwaway sessions.
//! - [`JsonFilePrefs`] — one JSON object per file, atomically rewritten on
//!   every set (write-to-temp then rename).
//!
//! [`ThreadPrefs`] is the typed facade the session uses on top of the raw
//! store.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::warn;

use parlor_core::ids::ThreadId;

/// Store key for the thread-id → custom-title map.
pub const TITLES_KEY: &str = "custom_titles";
/// Store key for the hidden thread-id list.
pub const HIDDEN_KEY: &str = "hidden_threads";

/// A small injected key-value store with change notification.
pub trait PrefsStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Option<String>;
    /// Write a value. Storage failures are logged, not propagated — the
    /// in-memory view stays authoritative for the session.
    fn set(&self, key: &str, value: &str);
    /// Subscribe to change notifications (a bumped revision per set).
    fn subscribe(&self) -> watch::Receiver<u64>;
}

/// In-memory store.
pub struct MemoryPrefs {
    values: Mutex<HashMap<String, String>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for MemoryPrefs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPrefs {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            values: Mutex::new(HashMap::new()),
            revision: Arc::new(tx),
        }
    }
}

impl PrefsStore for MemoryPrefs {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let _ = self.values.lock().insert(key.to_owned(), value.to_owned());
        self.revision.send_modify(|r| *r += 1);
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

/// File-backed store: a single JSON object of string values.
pub struct JsonFilePrefs {
    path: PathBuf,
    cache: Mutex<HashMap<String, String>>,
    revision: Arc<watch::Sender<u64>>,
}

impl JsonFilePrefs {
    /// Open a store at `path`, loading existing content when present.
    ///
    /// A missing or unreadable file starts empty; a malformed file is
    /// discarded with a warning rather than failing the session.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cache = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str::<HashMap<String, String>>(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "discarding malformed prefs file");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        let (tx, _) = watch::channel(0);
        Self {
            path,
            cache: Mutex::new(cache),
            revision: Arc::new(tx),
        }
    }

    /// Serialize the cache and atomically replace the file.
    fn persist(&self, snapshot: &HashMap<String, String>) {
        let json = match serde_json::to_string_pretty(snapshot) {
            Ok(j) => j,
            Err(e) => {
                warn!(error = %e, "failed to serialize prefs");
                return;
            }
        };
        let tmp = self.path.with_extension("tmp");
        if let Err(e) = std::fs::write(&tmp, json).and_then(|()| std::fs::rename(&tmp, &self.path))
        {
            warn!(path = %self.path.display(), error = %e, "failed to persist prefs");
        }
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PrefsStore for JsonFilePrefs {
    fn get(&self, key: &str) -> Option<String> {
        self.cache.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let snapshot = {
            let mut cache = self.cache.lock();
            let _ = cache.insert(key.to_owned(), value.to_owned());
            cache.clone()
        };
        self.persist(&snapshot);
        self.revision.send_modify(|r| *r += 1);
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

/// Typed facade over the raw store for thread titles and hidden flags.
#[derive(Clone)]
pub struct ThreadPrefs {
    store: Arc<dyn PrefsStore>,
}

impl ThreadPrefs {
    /// Wrap a store.
    #[must_use]
    pub fn new(store: Arc<dyn PrefsStore>) -> Self {
        Self { store }
    }

    fn titles(&self) -> HashMap<String, String> {
        self.store
            .get(TITLES_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    /// Custom title of a thread, if one was set.
    #[must_use]
    pub fn title(&self, thread_id: &ThreadId) -> Option<String> {
        self.titles().remove(thread_id.as_str())
    }

    /// Set a custom title.
    pub fn set_title(&self, thread_id: &ThreadId, title: &str) {
        let mut titles = self.titles();
        let _ = titles.insert(thread_id.as_str().to_owned(), title.to_owned());
        match serde_json::to_string(&titles) {
            Ok(raw) => self.store.set(TITLES_KEY, &raw),
            Err(e) => warn!(error = %e, "failed to encode titles"),
        }
    }

    /// The hidden thread-id set.
    #[must_use]
    pub fn hidden(&self) -> HashSet<String> {
        self.store
            .get(HIDDEN_KEY)
            .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok())
            .unwrap_or_default()
            .into_iter()
            .collect()
    }

    /// Whether a thread is locally hidden.
    #[must_use]
    pub fn is_hidden(&self, thread_id: &ThreadId) -> bool {
        self.hidden().contains(thread_id.as_str())
    }

    /// Hide a thread (the local-only "delete").
    pub fn hide(&self, thread_id: &ThreadId) {
        let mut hidden = self.hidden();
        if hidden.insert(thread_id.as_str().to_owned()) {
            self.store_hidden(&hidden);
        }
    }

    /// Unhide a thread. Returns whether it was hidden.
    pub fn unhide(&self, thread_id: &ThreadId) -> bool {
        let mut hidden = self.hidden();
        let was_hidden = hidden.remove(thread_id.as_str());
        if was_hidden {
            self.store_hidden(&hidden);
        }
        was_hidden
    }

    fn store_hidden(&self, hidden: &HashSet<String>) {
        let mut list: Vec<&String> = hidden.iter().collect();
        list.sort();
        match serde_json::to_string(&list) {
            Ok(raw) => self.store.set(HIDDEN_KEY, &raw),
            Err(e) => warn!(error = %e, "failed to encode hidden threads"),
        }
    }

    /// Subscribe to preference changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.store.subscribe()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
