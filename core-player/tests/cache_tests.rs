//! SourceCache behavior against an in-memory store.

use chrono::{TimeZone, Utc};
use core_player::cache::{CachedSourceRecord, SourceCache};
use host_bridge::{KeyValueStore, MemoryKeyValueStore, TrackId};
use std::sync::Arc;

fn record(id: u64, len: usize, minute: u32) -> CachedSourceRecord {
    CachedSourceRecord {
        track_id: TrackId(id),
        bytes: vec![id as u8; len],
        bitrate: Some(320),
        provider_tag: "official".into(),
        inserted_at: Utc.with_ymd_and_hms(2024, 6, 1, 10, minute, 0).unwrap(),
    }
}

#[tokio::test]
async fn get_roundtrips_a_put_record() {
    let cache = SourceCache::new(Arc::new(MemoryKeyValueStore::new()), None);

    cache.put(record(1, 64, 0)).await.unwrap();
    let loaded = cache.get(TrackId(1)).await.unwrap().unwrap();
    assert_eq!(loaded.track_id, TrackId(1));
    assert_eq!(loaded.bytes, vec![1u8; 64]);
    assert_eq!(loaded.provider_tag, "official");

    assert!(cache.get(TrackId(2)).await.unwrap().is_none());
}

#[tokio::test]
async fn exceeding_the_limit_evicts_oldest_first() {
    // 256-byte limit, 100-byte records: the third insert pushes the total
    // to 300 and must evict exactly the oldest record.
    let cache = SourceCache::new(Arc::new(MemoryKeyValueStore::new()), Some(256));

    cache.put(record(1, 100, 0)).await.unwrap();
    cache.put(record(2, 100, 1)).await.unwrap();
    cache.put(record(3, 100, 2)).await.unwrap();

    assert!(cache.get(TrackId(1)).await.unwrap().is_none());
    assert!(cache.get(TrackId(2)).await.unwrap().is_some());
    assert!(cache.get(TrackId(3)).await.unwrap().is_some());

    let stats = cache.stats();
    assert_eq!(stats.records, 2);
    assert_eq!(stats.total_bytes, 200);
}

#[tokio::test]
async fn one_oversized_insert_evicts_repeatedly() {
    let cache = SourceCache::new(Arc::new(MemoryKeyValueStore::new()), Some(250));

    cache.put(record(1, 100, 0)).await.unwrap();
    cache.put(record(2, 100, 1)).await.unwrap();
    // 240 bytes on its own; both older records must go.
    cache.put(record(3, 240, 2)).await.unwrap();

    assert!(cache.get(TrackId(1)).await.unwrap().is_none());
    assert!(cache.get(TrackId(2)).await.unwrap().is_none());
    assert!(cache.get(TrackId(3)).await.unwrap().is_some());
    assert_eq!(cache.stats().total_bytes, 240);
}

#[tokio::test]
async fn survivors_keep_relative_insertion_order() {
    let cache = SourceCache::new(Arc::new(MemoryKeyValueStore::new()), Some(250));

    for (id, minute) in [(1, 0), (2, 1), (3, 2), (4, 3)] {
        cache.put(record(id, 100, minute)).await.unwrap();
    }

    // ids 1 and 2 evicted; 3 then 4 remain and a further overflow must
    // take 3 before 4.
    assert!(cache.get(TrackId(1)).await.unwrap().is_none());
    assert!(cache.get(TrackId(2)).await.unwrap().is_none());

    cache.put(record(5, 100, 4)).await.unwrap();
    assert!(cache.get(TrackId(3)).await.unwrap().is_none());
    assert!(cache.get(TrackId(4)).await.unwrap().is_some());
    assert!(cache.get(TrackId(5)).await.unwrap().is_some());
}

#[tokio::test]
async fn disabled_limit_never_evicts() {
    let cache = SourceCache::new(Arc::new(MemoryKeyValueStore::new()), None);

    for minute in 0..20u32 {
        cache.put(record(minute as u64, 1000, minute)).await.unwrap();
    }

    let stats = cache.stats();
    assert_eq!(stats.records, 20);
    assert_eq!(stats.total_bytes, 20_000);
}

#[tokio::test]
async fn replacing_a_record_does_not_double_count() {
    let cache = SourceCache::new(Arc::new(MemoryKeyValueStore::new()), None);

    cache.put(record(1, 100, 0)).await.unwrap();
    cache.put(record(1, 150, 1)).await.unwrap();

    let stats = cache.stats();
    assert_eq!(stats.records, 1);
    assert_eq!(stats.total_bytes, 150);
}

#[tokio::test]
async fn hydrate_rebuilds_counters_from_a_scan() {
    let store: Arc<MemoryKeyValueStore> = Arc::new(MemoryKeyValueStore::new());

    {
        let warm = SourceCache::new(store.clone(), None);
        warm.put(record(1, 100, 0)).await.unwrap();
        warm.put(record(2, 200, 1)).await.unwrap();
    }

    // Fresh instance over the same store: counters start empty and the
    // scan restores them.
    let cold = SourceCache::new(store, Some(250));
    assert_eq!(cold.stats().total_bytes, 0);

    let stats = cold.hydrate().await.unwrap();
    assert_eq!(stats.records, 2);
    assert_eq!(stats.total_bytes, 300);

    // The rebuilt index still evicts oldest-first.
    cold.put(record(3, 100, 2)).await.unwrap();
    assert!(cold.get(TrackId(1)).await.unwrap().is_none());
    assert!(cold.get(TrackId(2)).await.unwrap().is_some());
}

#[tokio::test]
async fn hydrate_skips_unreadable_records() {
    let store: Arc<MemoryKeyValueStore> = Arc::new(MemoryKeyValueStore::new());
    store
        .put("source:999", bytes::Bytes::from_static(b"not json"))
        .await
        .unwrap();

    let cache = SourceCache::new(store, None);
    let stats = cache.hydrate().await.unwrap();
    assert_eq!(stats.records, 0);
    assert_eq!(stats.total_bytes, 0);
}

#[tokio::test]
async fn clear_drops_everything() {
    let cache = SourceCache::new(Arc::new(MemoryKeyValueStore::new()), None);
    cache.put(record(1, 100, 0)).await.unwrap();
    cache.put(record(2, 100, 1)).await.unwrap();

    cache.clear().await.unwrap();
    assert_eq!(cache.stats().records, 0);
    assert!(cache.get(TrackId(1)).await.unwrap().is_none());
}
