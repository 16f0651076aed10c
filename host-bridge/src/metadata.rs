//! Metadata gateway seam.
//!
//! Track, album, artist, and playlist metadata is owned by an external
//! catalog service; the core only ever asks for track details by id and
//! for the ordered id lists that seed the play queue.

use crate::error::Result;
use crate::model::{Track, TrackId};
use async_trait::async_trait;

/// Read-side catalog access.
///
/// Calls must not block indefinitely; failures are ordinary errors which
/// the core absorbs or surfaces according to its own policy.
#[async_trait]
pub trait MetadataGateway: Send + Sync {
    /// Full display metadata for one track.
    async fn track_detail(&self, id: TrackId) -> Result<Track>;

    /// Ordered track ids of an album.
    async fn album_tracks(&self, album_id: u64) -> Result<Vec<TrackId>>;

    /// An artist's popular tracks, in catalog order.
    async fn artist_tracks(&self, artist_id: u64) -> Result<Vec<TrackId>>;

    /// Ordered track ids of a playlist.
    async fn playlist_tracks(&self, playlist_id: u64) -> Result<Vec<TrackId>>;

    /// Next batch of the personal-FM recommendation feed. The batch may be
    /// empty; callers retry per their own budget.
    async fn personal_fm(&self) -> Result<Vec<Track>>;

    /// Marks a personal-FM track as unwanted. Best effort.
    async fn fm_trash(&self, id: TrackId) -> Result<()>;
}
