//! # Playback Persistence
//!
//! Serializable projection of the playback state plus the adapter that
//! writes it durably. Mutations flow through explicit
//! [`PersistenceAdapter::record`] calls; a trailing debounce window
//! coalesces bursts of mutation into a single write. The snapshot is
//! restored at construction time, including the last known seek position,
//! before playback is enabled.

use crate::error::Result;
use crate::queue::QueueState;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use host_bridge::{KeyValueStore, Track};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const SNAPSHOT_KEY: &str = "player:snapshot";

/// Durable projection of the playback state.
///
/// Transient loading flags are deliberately absent; they reset on restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub queue: QueueState,
    pub current_track: Option<Track>,
    /// Last known seek position, whole seconds.
    pub progress_secs: u64,
    pub volume: f32,
    pub personal_fm: bool,
    pub fm_current: Option<Track>,
    pub fm_next: Option<Track>,
    pub saved_at: DateTime<Utc>,
}

struct AdapterInner {
    store: Arc<dyn KeyValueStore>,
    debounce: Duration,
    pending: Mutex<Option<PlaybackSnapshot>>,
    generation: AtomicU64,
    wakeup: Notify,
}

impl AdapterInner {
    async fn write(&self, snapshot: &PlaybackSnapshot) {
        let payload = match serde_json::to_vec(snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "snapshot failed to serialize");
                return;
            }
        };
        match self.store.put(SNAPSHOT_KEY, Bytes::from(payload)).await {
            Ok(()) => debug!("playback snapshot persisted"),
            Err(e) => warn!(error = %e, "snapshot write failed"),
        }
    }
}

/// Debounced snapshot writer over the injected key-value store.
pub struct PersistenceAdapter {
    inner: Arc<AdapterInner>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl PersistenceAdapter {
    /// Creates the adapter and starts its writer task.
    pub fn new(store: Arc<dyn KeyValueStore>, debounce: Duration) -> Self {
        let inner = Arc::new(AdapterInner {
            store,
            debounce,
            pending: Mutex::new(None),
            generation: AtomicU64::new(0),
            wakeup: Notify::new(),
        });

        let writer = {
            let inner = inner.clone();
            tokio::spawn(async move {
                loop {
                    inner.wakeup.notified().await;

                    // Trailing debounce: keep sleeping while new snapshots
                    // arrive within the window, so a burst becomes one write.
                    loop {
                        let generation = inner.generation.load(Ordering::Acquire);
                        tokio::time::sleep(inner.debounce).await;
                        if inner.generation.load(Ordering::Acquire) == generation {
                            break;
                        }
                    }

                    let snapshot = inner.pending.lock().take();
                    if let Some(snapshot) = snapshot {
                        inner.write(&snapshot).await;
                    }
                }
            })
        };

        Self {
            inner,
            writer: Mutex::new(Some(writer)),
        }
    }

    /// Records a fresh snapshot for eventual writing. Cheap; called after
    /// every state-changing command.
    pub fn record(&self, snapshot: PlaybackSnapshot) {
        *self.inner.pending.lock() = Some(snapshot);
        self.inner.generation.fetch_add(1, Ordering::Release);
        self.inner.wakeup.notify_one();
    }

    /// Loads the persisted snapshot, if any. A payload that does not parse
    /// is reported once and treated as absent rather than wedging startup.
    pub async fn restore(&self) -> Result<Option<PlaybackSnapshot>> {
        let Some(payload) = self.inner.store.get(SNAPSHOT_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_slice(&payload) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!(error = %e, "persisted snapshot does not parse; starting fresh");
                Ok(None)
            }
        }
    }

    /// Writes `snapshot` immediately, bypassing the debounce. Used on
    /// shutdown.
    pub async fn flush(&self, snapshot: PlaybackSnapshot) {
        *self.inner.pending.lock() = None;
        self.inner.write(&snapshot).await;
    }

    /// Drops pending state and deletes the durable snapshot.
    pub async fn reset(&self) -> Result<()> {
        *self.inner.pending.lock() = None;
        self.inner.store.delete(SNAPSHOT_KEY).await?;
        Ok(())
    }

    /// Stops the writer task. Pending unwritten state is discarded; call
    /// [`flush`](Self::flush) first when it matters.
    pub fn shutdown(&self) {
        if let Some(writer) = self.writer.lock().take() {
            writer.abort();
        }
    }
}

impl Drop for PersistenceAdapter {
    fn drop(&mut self) {
        self.shutdown();
    }
}
