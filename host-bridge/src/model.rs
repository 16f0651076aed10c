//! Shared domain value types exchanged across the bridge seams.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a track, as issued by the upstream catalog.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TrackId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Display metadata for a track. Immutable once fetched; owned by the
/// metadata gateway and referenced by id everywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Duration in milliseconds.
    pub duration_ms: u64,
    /// Position within its album, when known.
    pub track_number: Option<u32>,
    /// Cover art location, when known.
    pub artwork_url: Option<String>,
}

impl Track {
    /// Duration in whole seconds, never less than one for a real track.
    pub fn duration_secs(&self) -> u64 {
        (self.duration_ms / 1000).max(1)
    }
}

/// Coarse audio quality selector mapped by each provider onto its own
/// quality parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BitrateTier {
    Standard,
    Higher,
    #[default]
    High,
    Lossless,
}

impl BitrateTier {
    /// Nominal bitrate in kbps for providers that take a numeric parameter.
    pub fn kbps(self) -> u32 {
        match self {
            BitrateTier::Standard => 128,
            BitrateTier::Higher => 192,
            BitrateTier::High => 320,
            BitrateTier::Lossless => 999,
        }
    }
}

/// Repeat behavior of the play queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    #[default]
    Off,
    /// Repeat the whole list, wrapping at either end.
    On,
    /// Replay the current track on completion.
    One,
}

/// Subscription tier of the signed-in account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Paid,
}

/// Playable audio data: either a streamable URL or raw encoded bytes.
#[derive(Debug, Clone)]
pub enum MediaSource {
    Url(String),
    Bytes(Bytes),
}

impl MediaSource {
    /// Rewrites plain-http URLs to https; byte sources pass through.
    pub fn into_secure(self) -> Self {
        match self {
            MediaSource::Url(url) => match url.strip_prefix("http://") {
                Some(rest) => MediaSource::Url(format!("https://{rest}")),
                None => MediaSource::Url(url),
            },
            bytes => bytes,
        }
    }
}

/// A successfully resolved audio source plus where it came from.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub media: MediaSource,
    /// Actual bitrate in kbps when the provider reports one.
    pub bitrate: Option<u32>,
    /// Provider tag recorded alongside cached copies, e.g. `"official"`
    /// or `"unblock:bilibili"`.
    pub provider_tag: String,
}

/// Per-request hints passed to audio source providers.
#[derive(Debug, Clone, Default)]
pub struct SourceHints {
    pub bitrate: BitrateTier,
    /// Whether the session currently has a signed-in account. Providers
    /// with a guest endpoint fall back to it when this is false.
    pub authenticated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_duration_floors_to_one_second() {
        let track = Track {
            id: TrackId(1),
            title: "t".into(),
            artist: "a".into(),
            album: "b".into(),
            duration_ms: 300,
            track_number: None,
            artwork_url: None,
        };
        assert_eq!(track.duration_secs(), 1);
    }

    #[test]
    fn bitrate_tiers_map_to_kbps() {
        assert_eq!(BitrateTier::Standard.kbps(), 128);
        assert_eq!(BitrateTier::Lossless.kbps(), 999);
    }

    #[test]
    fn media_source_upgrades_to_https() {
        let upgraded = MediaSource::Url("http://cdn.example.com/a.mp3".into()).into_secure();
        match upgraded {
            MediaSource::Url(url) => assert_eq!(url, "https://cdn.example.com/a.mp3"),
            MediaSource::Bytes(_) => panic!("expected url"),
        }

        let already = MediaSource::Url("https://cdn.example.com/a.mp3".into()).into_secure();
        match already {
            MediaSource::Url(url) => assert_eq!(url, "https://cdn.example.com/a.mp3"),
            MediaSource::Bytes(_) => panic!("expected url"),
        }
    }
}
