//! # Host Bridge Traits
//!
//! Trait seams for everything the playback core requires from its host:
//! metadata lookups, audio byte providers, durable key-value storage, the
//! audio output device, and the fire-and-forget sinks (notifications,
//! listening reports, media integration).
//!
//! The core never talks to the network, the filesystem, or the audio stack
//! directly; hosts inject implementations of these traits through the
//! engine configuration. Every trait here is object-safe and `Send + Sync`
//! so implementations can be shared as `Arc<dyn …>` across tasks.

pub mod error;
pub mod fetch;
pub mod metadata;
pub mod model;
pub mod output;
pub mod provider;
pub mod session;
pub mod sinks;
pub mod store;

#[cfg(feature = "memory-store")]
pub mod memory;

pub use error::{BridgeError, Result};
pub use fetch::MediaFetcher;
pub use metadata::MetadataGateway;
pub use model::{
    BitrateTier, MediaSource, RepeatMode, ResolvedSource, SourceHints, SubscriptionTier, Track,
    TrackId,
};
pub use output::{AudioOutput, OutputError, OutputEvent, OutputHandle};
pub use provider::{AudioSourceProvider, ProviderKind, SearchMode, UnblockConfig};
pub use session::SessionInfo;
pub use sinks::{ListeningReporter, MediaIntegration, NotificationSink, NowPlayingUpdate};
pub use store::KeyValueStore;

#[cfg(feature = "memory-store")]
pub use memory::MemoryKeyValueStore;
