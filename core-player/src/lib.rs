//! # Core Player
//!
//! The playback core: queue traversal, multi-provider audio-source
//! resolution with a bounded local cache, a one-step-lookahead personal-FM
//! feed, debounced state persistence, and the controller state machine
//! that ties them to a single audio output device.
//!
//! Everything external (catalog metadata, the byte providers, durable
//! storage, the output device, notification and reporting sinks) is
//! injected through `host-bridge` traits via
//! [`core_runtime::config::EngineConfig`]. The controller is constructed
//! once, `init()` restores the previous session, and `shutdown()` flushes
//! state; there are no process-wide singletons.

pub mod cache;
pub mod controller;
pub mod error;
pub mod fm;
pub mod model;
pub mod persistence;
pub mod queue;
pub mod resolver;

pub use cache::{CacheStats, CachedSourceRecord, SourceCache};
pub use controller::PlayerController;
pub use error::{PlayerError, Result};
pub use fm::PersonalFmEngine;
pub use model::{PlayerPhase, PlaylistKind, PlaylistSource, UnplayableAction};
pub use persistence::{PersistenceAdapter, PlaybackSnapshot};
pub use queue::{QueuePosition, QueueState};
pub use resolver::{LatencyRegistry, Resolution, SourceResolver};
