//! Cached document reads
//!
//! [`CachedStore`] sits between a shelf and its store and answers `get` from
//! a [`ByteCache`] when it can.
//!
//! ## Read Path
//! ```text
//! get(key)
//!   │
//!   ├─ cache miss ──────────────────────────────► inner.get ─► remember
//!   │
//!   └─ cache hit ─► inner.revision(key)
//!                     ├─ same revision ─────────► cached document
//!                     ├─ newer revision ────────► inner.get ─► remember
//!                     └─ KeyNotFound ───────────► evict, KeyNotFound
//! ```

use bytes::Bytes;

use crate::error::{Result, ShelfError};
use crate::store::{BulkResult, Document, DocumentStore, NewDocument, Revision};

use super::ByteCache;

/// Document store decorator caching single-document reads
///
/// Entries are keyed `"{location}/{key}"` and hold the bincode form of the
/// document. Every hit is revalidated against the revision the inner store
/// holds, so writes and deletes made through other handles are observed on
/// the next read. Writes and deletes through this store refresh or evict
/// their key directly.
pub struct CachedStore<S, C> {
    inner: S,
    cache: C,
}

impl<S: DocumentStore, C: ByteCache> CachedStore<S, C> {
    pub fn new(inner: S, cache: C) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn cache_key(&self, key: &str) -> String {
        format!("{}/{}", self.inner.location(), key)
    }

    fn remember(&self, document: &Document) {
        match bincode::serialize(document) {
            Ok(bytes) => self.cache.set(&self.cache_key(&document.key), Bytes::from(bytes)),
            Err(e) => tracing::warn!("Not caching document {}: {}", document.key, e),
        }
    }
}

impl<S: DocumentStore, C: ByteCache> DocumentStore for CachedStore<S, C> {
    fn location(&self) -> &str {
        self.inner.location()
    }

    fn get(&self, key: &str) -> Result<Document> {
        let cache_key = self.cache_key(key);
        if let Some(bytes) = self.cache.get(&cache_key) {
            match bincode::deserialize::<Document>(&bytes) {
                Ok(cached) => match self.inner.revision(key) {
                    Ok(current) if current == cached.revision => return Ok(cached),
                    Ok(current) => {
                        tracing::debug!(
                            "Cached {} at revision {} is stale (store has {})",
                            cache_key,
                            cached.revision,
                            current
                        );
                    }
                    Err(ShelfError::KeyNotFound(missing)) => {
                        self.cache.delete(&cache_key);
                        return Err(ShelfError::KeyNotFound(missing));
                    }
                    Err(e) => return Err(e),
                },
                Err(e) => {
                    tracing::warn!("Dropping unreadable cache entry {}: {}", cache_key, e);
                    self.cache.delete(&cache_key);
                }
            }
        }

        match self.inner.get(key) {
            Ok(document) => {
                self.remember(&document);
                Ok(document)
            }
            Err(e) => {
                // A stale entry whose document is gone
                if e.is_not_found() {
                    self.cache.delete(&cache_key);
                }
                Err(e)
            }
        }
    }

    fn revision(&self, key: &str) -> Result<Revision> {
        self.inner.revision(key)
    }

    fn put(&self, key: &str, payload: String, revision: Option<&Revision>) -> Result<Document> {
        let cache_key = self.cache_key(key);
        self.cache.delete(&cache_key);

        let result = self.inner.put(key, payload, revision);
        if let Ok(document) = &result {
            self.remember(document);
        }
        result
    }

    fn delete(&self, key: &str, revision: &Revision) -> Result<()> {
        self.cache.delete(&self.cache_key(key));
        self.inner.delete(key, revision)
    }

    fn create(&self, documents: Vec<NewDocument>) -> Result<Vec<BulkResult>> {
        let results = self.inner.create(documents)?;
        for result in &results {
            self.cache.delete(&self.cache_key(&result.key));
        }
        Ok(results)
    }

    fn all(&self) -> Result<Vec<Document>> {
        self.inner.all()
    }
}
