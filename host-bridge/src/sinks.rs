//! Fire-and-forget host sinks.
//!
//! None of these affect playback correctness: notification and reporting
//! failures are swallowed by the core, and media integration is entirely
//! optional.

use crate::error::Result;
use crate::model::Track;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// User-visible, non-fatal notices ("Cannot play <title>").
pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: &str);
}

/// Listening-history reporting: scrobbles and now-playing updates.
///
/// Both calls are best effort; implementations should swallow their own
/// transport errors and the core ignores the returned result beyond a
/// trace log.
#[async_trait]
pub trait ListeningReporter: Send + Sync {
    /// Reports how much of `track` was listened to, in seconds, together
    /// with the id of the list it was played from.
    async fn scrobble(&self, track: &Track, source_id: u64, elapsed_secs: u64) -> Result<()>;

    /// Reports that `track` just started playing.
    async fn now_playing(&self, track: &Track) -> Result<()>;
}

/// Snapshot of playback state pushed to host media hooks (tray, lock-screen
/// controls, rich presence).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlayingUpdate {
    pub track: Option<Track>,
    pub playing: bool,
    pub position_secs: u64,
}

/// Optional host media-integration hooks. Absence of an implementation
/// must not affect playback.
pub trait MediaIntegration: Send + Sync {
    fn playback_changed(&self, update: &NowPlayingUpdate);
}
