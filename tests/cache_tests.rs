//! Tests for cached document reads
//!
//! These tests verify:
//! - Hit/miss accounting with a no-op and an in-memory cache
//! - Writes through the cached store refresh the cache
//! - Cached entries are revalidated against writes from other handles
//! - A shelf works unchanged on top of a cached store

use std::sync::Arc;

use docshelf::cache::{ByteCache, CachedStore, MemoryCache, NoopCache, StatCache};
use docshelf::store::{DocumentStore, MemoryBackend, MemoryStore, NewDocument, StoreBackend};
use docshelf::{Shelf, ShelfConfig};

const DB: &str = "couchquery_unittest";

// =============================================================================
// Helper Functions
// =============================================================================

fn cached_store<C: ByteCache>(cache: C) -> CachedStore<MemoryStore, C> {
    let backend = MemoryBackend::new();
    backend.create_db(DB).unwrap();
    CachedStore::new(backend.connect(DB).unwrap(), cache)
}

/// A cached store plus a second, uncached connection to the same database
fn cached_pair<C: ByteCache>(cache: C) -> (MemoryStore, CachedStore<MemoryStore, C>) {
    let backend = MemoryBackend::new();
    backend.create_db(DB).unwrap();
    let raw = backend.connect(DB).unwrap();
    let cached = CachedStore::new(backend.connect(DB).unwrap(), cache);
    (raw, cached)
}

/// Create 100 documents, then read 120 keys ten times over
fn perform<C: ByteCache>(store: &CachedStore<MemoryStore, C>) {
    let docs: Vec<NewDocument> = (0..100)
        .map(|x| NewDocument::new(x.to_string(), format!("\"document {}\"", x)))
        .collect();
    let results = store.create(docs).unwrap();
    assert!(results.iter().all(|r| r.is_ok()));

    for _ in 0..10 {
        for x in 0..120 {
            match store.get(&x.to_string()) {
                Ok(doc) => assert_eq!(doc.payload, format!("\"document {}\"", x)),
                Err(e) => assert!(e.is_not_found()),
            }
        }
    }
}

// =============================================================================
// Hit/Miss Tests
// =============================================================================

#[test]
fn test_no_cache_misses_every_read() {
    let cache = Arc::new(StatCache::new(NoopCache));
    let store = cached_store(Arc::clone(&cache));

    perform(&store);

    assert_eq!(cache.hits(), 0);
    assert_eq!(cache.misses(), 1200);
}

#[test]
fn test_memory_cache_serves_repeat_reads() {
    let cache = Arc::new(StatCache::new(MemoryCache::new()));
    let store = cached_store(Arc::clone(&cache));

    perform(&store);

    // Absent keys are never cached
    assert_eq!(cache.misses(), 100 + 20 * 10);
    assert_eq!(cache.hits(), 900);
    assert_eq!(cache.to_string(), "(h:900, m:300)");
    assert_eq!(cache.delegate().len(), 100);
}

// =============================================================================
// Invalidation Tests
// =============================================================================

#[test]
fn test_put_refreshes_cached_document() {
    let cache = Arc::new(StatCache::new(MemoryCache::new()));
    let store = cached_store(Arc::clone(&cache));

    let first = store.put("k", "1".to_string(), None).unwrap();
    assert_eq!(store.get("k").unwrap(), first);
    assert_eq!(cache.hits(), 1);

    let second = store.put("k", "2".to_string(), Some(&first.revision)).unwrap();
    assert_eq!(store.get("k").unwrap(), second);
    assert_eq!(cache.hits(), 2);
}

#[test]
fn test_delete_evicts_cached_document() {
    let cache = Arc::new(MemoryCache::new());
    let store = cached_store(Arc::clone(&cache));

    let doc = store.put("k", "1".to_string(), None).unwrap();
    assert_eq!(cache.len(), 1);

    store.delete("k", &doc.revision).unwrap();
    assert!(cache.is_empty());
    assert!(store.get("k").unwrap_err().is_not_found());
}

#[test]
fn test_unreadable_entry_is_refetched() {
    let cache = Arc::new(MemoryCache::new());
    let store = cached_store(Arc::clone(&cache));
    let doc = store.put("k", "1".to_string(), None).unwrap();

    cache.set(&format!("{}/k", DB), bytes::Bytes::from_static(b"\x01"));

    assert_eq!(store.get("k").unwrap(), doc);
}

#[test]
fn test_external_overwrite_is_observed() {
    let cache = Arc::new(StatCache::new(MemoryCache::new()));
    let (raw, store) = cached_pair(Arc::clone(&cache));

    let first = store.put("k", "1".to_string(), None).unwrap();
    assert_eq!(store.get("k").unwrap(), first);

    let second = raw.put("k", "2".to_string(), Some(&first.revision)).unwrap();
    assert_eq!(store.get("k").unwrap(), second);

    // The refreshed entry is served from then on
    assert_eq!(store.get("k").unwrap(), second);
    assert_eq!(cache.hits(), 3);
    assert_eq!(cache.misses(), 0);
}

#[test]
fn test_external_delete_evicts_cached_document() {
    let cache = Arc::new(MemoryCache::new());
    let (raw, store) = cached_pair(Arc::clone(&cache));

    let doc = store.put("k", "1".to_string(), None).unwrap();
    assert_eq!(cache.len(), 1);

    raw.delete("k", &doc.revision).unwrap();
    assert!(store.get("k").unwrap_err().is_not_found());
    assert!(cache.is_empty());
}

#[test]
fn test_revision_bypasses_cache() {
    let cache = Arc::new(StatCache::new(MemoryCache::new()));
    let (raw, store) = cached_pair(Arc::clone(&cache));

    let doc = raw.put("k", "1".to_string(), None).unwrap();
    assert_eq!(store.revision("k").unwrap(), doc.revision);
    assert!(store.revision("missing").unwrap_err().is_not_found());
    assert_eq!(cache.hits() + cache.misses(), 0);
}

// =============================================================================
// Shelf Integration Tests
// =============================================================================

#[test]
fn test_shelf_over_cached_store() {
    let cache = Arc::new(StatCache::new(MemoryCache::new()));
    let store = cached_store(Arc::clone(&cache));

    let mut shelf: Shelf<Vec<String>, _> = Shelf::from_store(store, ShelfConfig::new(DB)).unwrap();
    shelf.set("list", vec!["a".to_string()]).unwrap();

    for _ in 0..5 {
        assert_eq!(shelf.get("list").unwrap(), vec!["a".to_string()]);
    }
    assert_eq!(cache.hits(), 5);
    shelf.close().unwrap();
}

#[test]
fn test_shelf_over_cached_store_sees_other_handles() {
    let cache = Arc::new(StatCache::new(MemoryCache::new()));
    let (raw, store) = cached_pair(Arc::clone(&cache));

    let mut shelf: Shelf<Vec<i32>, _> = Shelf::from_store(store, ShelfConfig::new(DB)).unwrap();
    shelf.set("item1", vec![]).unwrap();
    assert_eq!(shelf.get("item1").unwrap(), Vec::<i32>::new());

    let doc = raw.get("item1").unwrap();
    let doc = raw.put("item1", "[9]".to_string(), Some(&doc.revision)).unwrap();
    assert_eq!(shelf.get("item1").unwrap(), vec![9]);

    raw.delete("item1", &doc.revision).unwrap();
    assert!(!shelf.contains("item1").unwrap());
    assert_eq!(shelf.keys().unwrap().count(), 0);
    assert!(shelf.get("item1").unwrap_err().is_not_found());
    shelf.close().unwrap();
}
