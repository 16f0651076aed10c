//! Durable key-value storage seam.
//!
//! Backs both the bounded audio source cache and the playback snapshot.
//! Implementations decide where bytes live (SQLite, flat files, browser
//! storage); the core only requires per-key atomicity and a full-scan
//! primitive used once at startup to rebuild the cache byte counter.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Async key-value store with string keys and opaque byte values.
///
/// `put` and `get` must be atomic at key granularity: a concurrent reader
/// sees either the previous value or the new one, never a torn write. No
/// cross-key transactionality is assumed.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    async fn put(&self, key: &str, value: Bytes) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// All entries whose key starts with `prefix`. Used once at startup;
    /// implementations need not optimize it.
    async fn scan(&self, prefix: &str) -> Result<Vec<(String, Bytes)>>;
}
