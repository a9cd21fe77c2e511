//! Cache Module
//!
//! Byte caches used to short-circuit document reads.
//!
//! ## Responsibilities
//! - A minimal get/set/delete byte cache contract ([`ByteCache`])
//! - A cache that never stores anything ([`NoopCache`]), for measuring
//!   uncached behaviour
//! - An in-memory cache ([`MemoryCache`])
//! - Hit/miss accounting around any cache ([`StatCache`])
//! - A document store decorator that serves `get` from a cache
//!   ([`CachedStore`])

mod response;
mod stats;

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::RwLock;

pub use response::CachedStore;
pub use stats::StatCache;

/// A pluggable byte cache
///
/// All methods take `&self`; implementations use interior mutability.
pub trait ByteCache: Send + Sync {
    /// Cached bytes for `key`, if any
    fn get(&self, key: &str) -> Option<Bytes>;

    fn set(&self, key: &str, value: Bytes);

    fn delete(&self, key: &str);
}

/// Cache that stores nothing; every `get` misses
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl ByteCache for NoopCache {
    fn get(&self, _key: &str) -> Option<Bytes> {
        None
    }

    fn set(&self, _key: &str, _value: Bytes) {}

    fn delete(&self, _key: &str) {}
}

/// Unbounded in-memory cache
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Bytes>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ByteCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Bytes> {
        // Bytes clones share the underlying buffer
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Bytes) {
        self.entries.write().insert(key.to_string(), value);
    }

    fn delete(&self, key: &str) {
        self.entries.write().remove(key);
    }
}

impl<C: ByteCache + ?Sized> ByteCache for std::sync::Arc<C> {
    fn get(&self, key: &str) -> Option<Bytes> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Bytes) {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) {
        (**self).delete(key)
    }
}
