// ABOUTME: Forwarding state: Foos thread membership and per-thread forward watermarks
// ABOUTME: Snapshot store trait with a JSON file backend, rewritten whole after every change
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::classifier::Classifier;

/// Watermark for a thread that has never forwarded anything
const NO_WATERMARK: &str = "0";

/// Everything the relay persists between restarts.
///
/// Both maps only ever grow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardState {
    /// Thread ID -> last forwarded message ID
    #[serde(default)]
    pub last_forwarded_by_thread: BTreeMap<String, String>,
    /// Threads confirmed to host a Foos game
    #[serde(default)]
    pub foos_threads: BTreeMap<String, bool>,
}

/// Load-or-default / save-whole storage for [`ForwardState`]
pub trait SnapshotStore: Send + Sync {
    /// Read the stored state. Never fails: unreadable storage yields an empty state.
    fn load(&self) -> ForwardState;

    /// Replace the stored state
    fn save(&self, state: &ForwardState) -> Result<()>;
}

/// Snapshot kept as one pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct JsonFileSnapshot {
    path: PathBuf,
}

impl JsonFileSnapshot {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl SnapshotStore for JsonFileSnapshot {
    fn load(&self) -> ForwardState {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "No readable state file, starting empty");
                return ForwardState::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "State file is corrupt, starting empty");
                ForwardState::default()
            }
        }
    }

    fn save(&self, state: &ForwardState) -> Result<()> {
        let json = serde_json::to_string_pretty(state).context("Failed to serialize state")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write state file {}", self.path.display()))?;
        Ok(())
    }
}

struct Inner {
    state: ForwardState,
    snapshot: Box<dyn SnapshotStore>,
}

/// Owned forwarding state plus its snapshot.
///
/// Each mutation runs lock -> mutate -> persist as one unit, so overlapping
/// handlers never interleave a read-modify-write.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<Mutex<Inner>>,
}

impl StateStore {
    /// Load the current snapshot and take ownership of it
    pub fn open(snapshot: impl SnapshotStore + 'static) -> Self {
        let state = snapshot.load();
        tracing::info!(
            foos_threads = state.foos_threads.len(),
            watermarks = state.last_forwarded_by_thread.len(),
            "Forward state loaded"
        );
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state,
                snapshot: Box::new(snapshot),
            })),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| anyhow::anyhow!("State lock poisoned: {}", e))
    }

    /// Mark the thread as a Foos game thread if the text carries a team marker.
    ///
    /// Returns true only when the thread was newly marked.
    pub fn mark_if_game_message(
        &self,
        classifier: &Classifier,
        thread_id: &str,
        text: &str,
    ) -> Result<bool> {
        if !classifier.is_foos_game_message(text) {
            return Ok(false);
        }
        self.mark_foos_thread(thread_id)
    }

    /// Mark a thread as hosting a Foos game and persist. Returns true when newly marked.
    pub fn mark_foos_thread(&self, thread_id: &str) -> Result<bool> {
        let mut inner = self.lock()?;
        if inner.state.foos_threads.get(thread_id).copied().unwrap_or(false) {
            return Ok(false);
        }
        inner.state.foos_threads.insert(thread_id.to_string(), true);
        inner.snapshot.save(&inner.state)?;
        tracing::info!(thread_id, "Marked thread as Foos game");
        Ok(true)
    }

    pub fn is_foos_thread(&self, thread_id: &str) -> Result<bool> {
        Ok(self
            .lock()?
            .state
            .foos_threads
            .get(thread_id)
            .copied()
            .unwrap_or(false))
    }

    /// Stored watermark for a thread, `"0"` when nothing was forwarded yet
    pub fn watermark(&self, thread_id: &str) -> Result<String> {
        Ok(self
            .lock()?
            .state
            .last_forwarded_by_thread
            .get(thread_id)
            .cloned()
            .unwrap_or_else(|| NO_WATERMARK.to_string()))
    }

    /// Whether `message_id` is strictly newer than the thread's watermark
    pub fn should_forward(&self, thread_id: &str, message_id: &str) -> Result<bool> {
        let last = self.watermark(thread_id)?;
        Ok(compare_ids(message_id, &last)? == Ordering::Greater)
    }

    /// Check the gate and advance the watermark in one locked step.
    ///
    /// Returns true when `message_id` was newer and is now the watermark; the
    /// caller owns the forward. Concurrent claims of one ID succeed once.
    pub fn claim_forward(&self, thread_id: &str, message_id: &str) -> Result<bool> {
        let mut inner = self.lock()?;
        let newer = match inner.state.last_forwarded_by_thread.get(thread_id) {
            Some(last) => compare_ids(message_id, last)?,
            None => compare_ids(message_id, NO_WATERMARK)?,
        } == Ordering::Greater;
        if !newer {
            return Ok(false);
        }
        inner
            .state
            .last_forwarded_by_thread
            .insert(thread_id.to_string(), message_id.to_string());
        inner.snapshot.save(&inner.state)?;
        Ok(true)
    }

    /// Advance the thread's watermark to `message_id` and persist
    pub fn record_forwarded(&self, thread_id: &str, message_id: &str) -> Result<()> {
        let mut inner = self.lock()?;
        inner
            .state
            .last_forwarded_by_thread
            .insert(thread_id.to_string(), message_id.to_string());
        inner.snapshot.save(&inner.state)?;
        Ok(())
    }
}

/// Compare two decimal message IDs numerically, at any width.
///
/// IDs are snowflakes and can exceed what a float represents exactly, so the
/// comparison works on the digit strings directly.
pub fn compare_ids(a: &str, b: &str) -> Result<Ordering> {
    let a = normalize_id(a)?;
    let b = normalize_id(b)?;
    Ok(a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
}

fn normalize_id(id: &str) -> Result<&str> {
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        anyhow::bail!("Invalid message ID: {:?}", id);
    }
    let stripped = id.trim_start_matches('0');
    Ok(if stripped.is_empty() { "0" } else { stripped })
}
