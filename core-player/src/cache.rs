//! # Source Cache
//!
//! Size-bounded store of resolved audio bytes, keyed by track id on top of
//! the injected [`KeyValueStore`]. Records are JSON with the audio payload
//! base64-encoded, so a single key holds the whole record and the store's
//! per-key atomicity carries over.
//!
//! The cumulative byte total is tracked incrementally and rehydrated by a
//! full scan at startup. After every successful `put` the cache evicts
//! records in ascending insertion-time order, one at a time, until back
//! under the configured limit; a cache constructed with `limit = None`
//! never evicts.

use crate::error::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use host_bridge::{KeyValueStore, TrackId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

const KEY_PREFIX: &str = "source:";

fn record_key(id: TrackId) -> String {
    format!("{KEY_PREFIX}{id}")
}

/// One cached audio source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedSourceRecord {
    pub track_id: TrackId,
    /// Encoded audio payload.
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
    /// Bitrate in kbps as reported by the provider, when known.
    pub bitrate: Option<u32>,
    /// Which provider produced the bytes, e.g. `"official"`.
    pub provider_tag: String,
    pub inserted_at: DateTime<Utc>,
}

mod base64_bytes {
    use super::BASE64;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        BASE64.decode(text).map_err(serde::de::Error::custom)
    }
}

/// Aggregate cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub records: usize,
    pub total_bytes: u64,
}

#[derive(Debug, Clone)]
struct IndexEntry {
    track_id: TrackId,
    inserted_at: DateTime<Utc>,
    len: u64,
}

/// Bounded audio-source cache.
pub struct SourceCache {
    store: Arc<dyn KeyValueStore>,
    limit_bytes: Option<u64>,
    /// Insertion-ordered view of what is cached, oldest first. Rebuilt by
    /// `hydrate`, kept in step by `put`/`delete`/eviction.
    index: Mutex<Vec<IndexEntry>>,
    total_bytes: Mutex<u64>,
}

impl SourceCache {
    pub fn new(store: Arc<dyn KeyValueStore>, limit_bytes: Option<u64>) -> Self {
        Self {
            store,
            limit_bytes,
            index: Mutex::new(Vec::new()),
            total_bytes: Mutex::new(0),
        }
    }

    /// Rebuilds the byte counter and eviction index from a full store
    /// scan. Call once at startup before the first `put`.
    pub async fn hydrate(&self) -> Result<CacheStats> {
        let entries = self.store.scan(KEY_PREFIX).await?;

        let mut index = Vec::with_capacity(entries.len());
        let mut total = 0u64;
        for (key, value) in entries {
            match serde_json::from_slice::<CachedSourceRecord>(&value) {
                Ok(record) => {
                    let len = record.bytes.len() as u64;
                    total += len;
                    index.push(IndexEntry {
                        track_id: record.track_id,
                        inserted_at: record.inserted_at,
                        len,
                    });
                }
                Err(e) => {
                    warn!(key, error = %e, "skipping unreadable cache record");
                }
            }
        }
        index.sort_by_key(|entry| entry.inserted_at);

        let stats = CacheStats {
            records: index.len(),
            total_bytes: total,
        };
        *self.index.lock() = index;
        *self.total_bytes.lock() = total;

        info!(
            records = stats.records,
            total_bytes = stats.total_bytes,
            "source cache hydrated"
        );
        Ok(stats)
    }

    /// Looks up a cached source. Side-effect free.
    pub async fn get(&self, id: TrackId) -> Result<Option<CachedSourceRecord>> {
        let Some(value) = self.store.get(&record_key(id)).await? else {
            return Ok(None);
        };
        match serde_json::from_slice(&value) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(track_id = %id, error = %e, "cached record does not parse");
                Ok(None)
            }
        }
    }

    /// Inserts (or replaces) a record, then evicts oldest-first until the
    /// cumulative byte total is back under the limit.
    pub async fn put(&self, record: CachedSourceRecord) -> Result<()> {
        let id = record.track_id;
        let len = record.bytes.len() as u64;

        // Replacing an existing record must not double-count its bytes.
        let previous_len = {
            let index = self.index.lock();
            index
                .iter()
                .find(|entry| entry.track_id == id)
                .map(|entry| entry.len)
        };

        let payload = serde_json::to_vec(&record)
            .map_err(|e| host_bridge::BridgeError::Serialization(e.to_string()))?;
        self.store.put(&record_key(id), Bytes::from(payload)).await?;

        {
            let mut index = self.index.lock();
            let mut total = self.total_bytes.lock();
            if let Some(old) = previous_len {
                index.retain(|entry| entry.track_id != id);
                *total = total.saturating_sub(old);
            }
            index.push(IndexEntry {
                track_id: id,
                inserted_at: record.inserted_at,
                len,
            });
            index.sort_by_key(|entry| entry.inserted_at);
            *total += len;
        }
        debug!(track_id = %id, bytes = len, "cached audio source");

        self.evict_excess().await;
        Ok(())
    }

    /// Oldest-first eviction, one record at a time, until under the limit.
    async fn evict_excess(&self) {
        let Some(limit) = self.limit_bytes else {
            return;
        };

        loop {
            let victim = {
                let mut index = self.index.lock();
                let total = self.total_bytes.lock();
                if *total <= limit || index.is_empty() {
                    break;
                }
                index.remove(0)
            };

            match self.store.delete(&record_key(victim.track_id)).await {
                Ok(()) => {
                    let remaining = {
                        let mut total = self.total_bytes.lock();
                        *total = total.saturating_sub(victim.len);
                        *total
                    };
                    debug!(
                        track_id = %victim.track_id,
                        freed = victim.len,
                        total_bytes = remaining,
                        "evicted oldest cached source"
                    );
                }
                Err(e) => {
                    // Leave accounting consistent and stop; the next put
                    // retries naturally.
                    warn!(track_id = %victim.track_id, error = %e, "cache eviction failed");
                    self.index.lock().insert(0, victim);
                    break;
                }
            }
        }
    }

    /// Removes a single record.
    pub async fn delete(&self, id: TrackId) -> Result<()> {
        self.store.delete(&record_key(id)).await?;
        let mut index = self.index.lock();
        if let Some(position) = index.iter().position(|entry| entry.track_id == id) {
            let entry = index.remove(position);
            let mut total = self.total_bytes.lock();
            *total = total.saturating_sub(entry.len);
        }
        Ok(())
    }

    /// Drops every cached record.
    pub async fn clear(&self) -> Result<()> {
        let victims: Vec<TrackId> = {
            let index = self.index.lock();
            index.iter().map(|entry| entry.track_id).collect()
        };
        for id in victims {
            self.delete(id).await?;
        }
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            records: self.index.lock().len(),
            total_bytes: *self.total_bytes.lock(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use chrono::TimeZone;

    fn record(id: u64, len: usize, minute: u32) -> CachedSourceRecord {
        CachedSourceRecord {
            track_id: TrackId(id),
            bytes: vec![0u8; len],
            bitrate: Some(320),
            provider_tag: "official".into(),
            inserted_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap(),
        }
    }

    #[test]
    fn record_roundtrips_through_json() {
        let original = record(5, 16, 0);
        let json = serde_json::to_vec(&original).unwrap();
        let back: CachedSourceRecord = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn payload_is_base64_in_json() {
        let json = serde_json::to_string(&record(5, 4, 0)).unwrap();
        assert!(json.contains(&BASE64.encode([0u8; 4])));
    }
}
