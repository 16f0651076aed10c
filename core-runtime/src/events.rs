//! # Engine Event Bus
//!
//! Decoupled communication from the playback core to its consumers
//! (host UI, media-integration adapters, diagnostics) via
//! `tokio::sync::broadcast`.
//!
//! Every state-changing command on the player emits one [`EngineEvent`].
//! Multiple subscribers listen independently; a subscriber that falls
//! behind receives `RecvError::Lagged` and simply continues with newer
//! events. Playback never blocks on a slow listener.
//!
//! ```rust
//! use core_runtime::events::{EngineEvent, EventBus};
//!
//! let bus = EventBus::new(64);
//! let mut rx = bus.subscribe();
//! bus.emit(EngineEvent::PlaybackStopped).ok();
//! ```

use host_bridge::{RepeatMode, Track, TrackId};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 64;

/// Events emitted by the playback engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum EngineEvent {
    /// The current track was replaced; metadata is already fetched.
    TrackChanged { track: Track },
    /// Audio is audible (fade-in completed).
    PlaybackStarted { track_id: TrackId },
    /// Audio was paused (fade-out completed).
    PlaybackPaused { track_id: Option<TrackId> },
    /// Queue traversal ended or the host stopped playback.
    PlaybackStopped,
    /// A track played to its natural end.
    TrackCompleted { track_id: TrackId },
    /// Periodic progress tick, roughly once per second while playing.
    PositionChanged {
        track_id: TrackId,
        position_secs: u64,
        duration_secs: u64,
    },
    /// Every source for this track was exhausted; the configured fallback
    /// is about to run.
    ResolutionFailed { track_id: TrackId },
    /// Repeat/shuffle/reversed flags changed.
    ModesChanged {
        repeat: RepeatMode,
        shuffle: bool,
        reversed: bool,
    },
    /// Personal FM was switched on or off.
    PersonalFmChanged { active: bool },
    /// The personal-FM feed exhausted its retry budget.
    PersonalFmExhausted,
}

impl EngineEvent {
    /// Short human-readable description, used by log forwarders.
    pub fn description(&self) -> &'static str {
        match self {
            EngineEvent::TrackChanged { .. } => "Current track replaced",
            EngineEvent::PlaybackStarted { .. } => "Playback started",
            EngineEvent::PlaybackPaused { .. } => "Playback paused",
            EngineEvent::PlaybackStopped => "Playback stopped",
            EngineEvent::TrackCompleted { .. } => "Track completed",
            EngineEvent::PositionChanged { .. } => "Position changed",
            EngineEvent::ResolutionFailed { .. } => "Source resolution failed",
            EngineEvent::ModesChanged { .. } => "Playback modes changed",
            EngineEvent::PersonalFmChanged { .. } => "Personal FM toggled",
            EngineEvent::PersonalFmExhausted => "Personal FM feed exhausted",
        }
    }

    /// Whether the event reports a failure condition.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            EngineEvent::ResolutionFailed { .. } | EngineEvent::PersonalFmExhausted
        )
    }
}

/// Broadcast bus carrying [`EngineEvent`]s.
///
/// Cloning the bus clones the sender; each `subscribe()` creates an
/// independent receiver. Emitting with no subscribers is not an error the
/// engine cares about; callers use `.ok()`.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers, returning how many received
    /// it.
    pub fn emit(&self, event: EngineEvent) -> Result<usize, SendError<EngineEvent>> {
        self.sender.send(event)
    }

    /// Creates a new independent subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
