//! Player-local value types. Shared catalog types (`Track`, `TrackId`,
//! `RepeatMode`, …) live in `host-bridge`; these are the ones only the
//! core itself cares about.

use serde::{Deserialize, Serialize};

/// Lifecycle phase of the playback controller.
///
/// `Loading` is reachable from any phase whenever the current track is
/// being replaced; `Stopped` is entered when queue traversal yields no
/// further track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerPhase {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Stopped,
}

/// Where the active queue came from. Informational only (resolution never
/// consults it) but it rides along in scrobbles and the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistKind {
    Album,
    Playlist,
    Artist,
    Url,
    CloudDisk,
    PersonalFm,
}

/// Provenance of the active queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSource {
    pub kind: PlaylistKind,
    pub id: u64,
}

impl Default for PlaylistSource {
    fn default() -> Self {
        Self {
            kind: PlaylistKind::Playlist,
            id: 0,
        }
    }
}

/// What the controller does when a track turns out to be unplayable,
/// chosen by whichever command initiated the replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnplayableAction {
    /// Skip forward (the default for forward navigation and auto-advance).
    #[default]
    PlayNext,
    /// Skip backward (used when the user was navigating backwards).
    PlayPrev,
}
