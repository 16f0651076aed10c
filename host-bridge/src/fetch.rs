//! Media download seam.
//!
//! The source cache stores raw bytes, but providers usually resolve to
//! URLs. This trait performs the download during the deferred write-back;
//! the core never owns an HTTP client of its own.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Downloads the full body of a media URL.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}
