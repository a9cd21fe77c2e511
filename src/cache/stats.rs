//! Hit/miss accounting
//!
//! Wraps any [`ByteCache`] and counts the outcome of every `get`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use super::ByteCache;

/// Delegating cache that keeps hit/miss statistics
#[derive(Debug, Default)]
pub struct StatCache<C> {
    delegate: C,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<C: ByteCache> StatCache<C> {
    pub fn new(delegate: C) -> Self {
        Self {
            delegate,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Zero both counters
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn delegate(&self) -> &C {
        &self.delegate
    }
}

impl<C: ByteCache> ByteCache for StatCache<C> {
    fn get(&self, key: &str) -> Option<Bytes> {
        let value = self.delegate.get(key);
        match value {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        value
    }

    fn set(&self, key: &str, value: Bytes) {
        self.delegate.set(key, value)
    }

    fn delete(&self, key: &str) {
        self.delegate.delete(key)
    }
}

impl<C: ByteCache> fmt::Display for StatCache<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(h:{}, m:{})", self.hits(), self.misses())
    }
}
