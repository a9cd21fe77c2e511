//! Shelf Module
//!
//! A dictionary-like facade whose storage is a remote document store.
//!
//! ## Responsibilities
//! - Mapping operations (get/set/delete/contains/keys/values/items/len)
//! - Optional write-back mode: values are kept decoded in a local cache,
//!   mutated in place and flushed on `sync()`/`close()`
//! - Last-writer-wins writes: a stale revision is re-read and the write
//!   retried instead of surfacing the conflict
//!
//! ## State Machine
//! ```text
//!            set/delete (writeback)
//!   ┌───────┐ ─────────────────▶ ┌───────┐
//!   │ Clean │                    │ Dirty │
//!   └───────┘ ◀───────────────── └───────┘
//!       │            sync()          │
//!       └──────── close() ───────────┘
//!                    │
//!                    ▼
//!               ┌────────┐
//!               │ Closed │  (every operation → ClosedHandle)
//!               └────────┘
//! ```
//!
//! ## Thread Safety
//! A shelf has no internal locking. Mutating operations take `&mut self`;
//! sharing one shelf between threads requires the caller to wrap it (e.g. in
//! a `Mutex`). Separate shelves on the same location are independent and
//! never share their local caches.

mod iter;
mod writeback;

use std::collections::btree_map;
use std::collections::HashSet;
use std::ops::{Deref, DerefMut};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec;
use crate::config::ShelfConfig;
use crate::error::{Result, ShelfError};
use crate::store::{Document, DocumentStore, Revision, StoreBackend};

pub use iter::{Items, Keys, Values};
pub use writeback::WriteBackCache;

/// Lifecycle state of a shelf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShelfState {
    /// Nothing written locally since the last flush
    Clean,

    /// Writeback-mode writes pending a flush
    Dirty,

    /// Closed; terminal
    Closed,
}

/// A value handed out by [`Shelf::get_mut`]
///
/// `Cached` borrows the write-back cache entry itself, so mutations are
/// flushed on the next sync. `Detached` is a fresh decode whose mutations
/// are discarded when it is dropped.
#[derive(Debug)]
pub enum ValueRef<'a, T> {
    Cached(&'a mut T),
    Detached(T),
}

impl<'a, T> ValueRef<'a, T> {
    /// Whether mutations through this reference will be persisted
    pub fn is_cached(&self) -> bool {
        matches!(self, ValueRef::Cached(_))
    }
}

impl<'a, T: Clone> ValueRef<'a, T> {
    pub fn into_owned(self) -> T {
        match self {
            ValueRef::Cached(value) => value.clone(),
            ValueRef::Detached(value) => value,
        }
    }
}

impl<'a, T> Deref for ValueRef<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            ValueRef::Cached(value) => value,
            ValueRef::Detached(value) => value,
        }
    }
}

impl<'a, T> DerefMut for ValueRef<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        match self {
            ValueRef::Cached(value) => value,
            ValueRef::Detached(value) => value,
        }
    }
}

/// Mapping capabilities of a persistent dictionary
pub trait PersistentMap<T> {
    type Keys<'a>: Iterator<Item = String>
    where
        Self: 'a;
    type Values<'a>: Iterator<Item = Result<T>>
    where
        Self: 'a;
    type Items<'a>: Iterator<Item = Result<(String, T)>>
    where
        Self: 'a;

    fn get(&mut self, key: &str) -> Result<T>;

    fn set(&mut self, key: &str, value: T) -> Result<()>;

    fn delete(&mut self, key: &str) -> Result<()>;

    fn contains(&self, key: &str) -> Result<bool>;

    fn keys(&self) -> Result<Self::Keys<'_>>;

    fn values(&self) -> Result<Self::Values<'_>>;

    fn items(&self) -> Result<Self::Items<'_>>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Persistent dictionary backed by a document store
///
/// Values are encoded with [`codec`] into the payload of one document per
/// key.
pub struct Shelf<T: Serialize, S: DocumentStore> {
    /// `None` once closed
    store: Option<S>,

    config: ShelfConfig,

    /// Decoded values pending a flush (writeback mode only)
    cache: WriteBackCache<T>,

    state: ShelfState,
}

impl<T: Serialize, S: DocumentStore> Shelf<T, S> {
    /// Flush every cached entry, then empty the cache
    ///
    /// The cache is only cleared once every entry has been written; after a
    /// failure all entries stay pending and a later sync rewrites them.
    pub fn sync(&mut self) -> Result<()> {
        let store = self.store.as_ref().ok_or(ShelfError::ClosedHandle)?;

        let pending = self.cache.len();
        for (key, value) in self.cache.iter() {
            let payload = codec::encode(value)?;
            write_through(store, key, payload, self.config.conflict_retries)?;
        }

        self.cache.clear();
        self.state = ShelfState::Clean;
        if pending > 0 {
            tracing::info!("Synced {} entries to {}", pending, store.location());
        }
        Ok(())
    }

    /// Flush pending state and release the store
    ///
    /// If the flush fails the shelf stays open so the caller can retry.
    pub fn close(&mut self) -> Result<()> {
        self.sync()?;
        if let Some(store) = self.store.take() {
            tracing::debug!("Closed shelf on {}", store.location());
        }
        self.state = ShelfState::Closed;
        Ok(())
    }

    pub fn state(&self) -> ShelfState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == ShelfState::Closed
    }

    pub fn is_writeback(&self) -> bool {
        self.config.writeback
    }

    /// Number of entries held in the write-back cache
    pub fn pending(&self) -> usize {
        self.cache.len()
    }

    pub fn cached_keys(&self) -> Vec<String> {
        self.cache.keys().cloned().collect()
    }

    pub fn location(&self) -> &str {
        &self.config.location
    }

    pub fn config(&self) -> &ShelfConfig {
        &self.config
    }
}

impl<T, S> Shelf<T, S>
where
    T: Serialize + DeserializeOwned,
    S: DocumentStore,
{
    /// Open a shelf on `config.location` through `backend`
    ///
    /// The database is created first when missing and
    /// `config.create_if_missing` is set.
    pub fn open<B>(backend: &B, config: ShelfConfig) -> Result<Self>
    where
        B: StoreBackend<Store = S>,
    {
        config.validate()?;

        if !backend.db_exists(&config.location)? {
            if !config.create_if_missing {
                return Err(ShelfError::DatabaseMissing(config.location.clone()));
            }
            match backend.create_db(&config.location) {
                // Another handle created it first
                Ok(()) | Err(ShelfError::DatabaseExists(_)) => {}
                Err(e) => return Err(e),
            }
        }

        let store = backend.connect(&config.location)?;
        Self::from_store(store, config)
    }

    /// Wrap an already connected store
    pub fn from_store(store: S, config: ShelfConfig) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            "Opened shelf on {} (writeback={})",
            store.location(),
            config.writeback
        );

        Ok(Self {
            store: Some(store),
            config,
            cache: WriteBackCache::new(),
            state: ShelfState::Clean,
        })
    }

    fn store(&self) -> Result<&S> {
        self.store.as_ref().ok_or(ShelfError::ClosedHandle)
    }

    /// Mutable access to the value of `key`
    ///
    /// In writeback mode the result borrows the cached entry, loading it from
    /// the store first if needed; changes made through it are persisted on the
    /// next sync. Otherwise the result is a detached copy.
    pub fn get_mut(&mut self, key: &str) -> Result<ValueRef<'_, T>> {
        let store = self.store.as_ref().ok_or(ShelfError::ClosedHandle)?;

        if !self.config.writeback {
            return Ok(ValueRef::Detached(fetch(store, key)?));
        }

        match self.cache.entry(key) {
            btree_map::Entry::Occupied(slot) => Ok(ValueRef::Cached(slot.into_mut())),
            btree_map::Entry::Vacant(slot) => {
                let value = fetch(store, key)?;
                Ok(ValueRef::Cached(slot.insert(value)))
            }
        }
    }

    /// Store `value` under `key`
    ///
    /// In writeback mode the value goes to the local cache only. Otherwise it
    /// is written through immediately, overwriting whatever the store holds.
    pub fn set(&mut self, key: &str, value: T) -> Result<()> {
        let store = self.store.as_ref().ok_or(ShelfError::ClosedHandle)?;

        // Unencodable values are rejected before anything changes
        let payload = codec::encode(&value)?;

        if self.config.writeback {
            self.cache.insert(key, value);
            self.state = ShelfState::Dirty;
            return Ok(());
        }

        write_through(store, key, payload, self.config.conflict_retries)?;
        Ok(())
    }

    /// Set several keys in order
    pub fn update<I, K>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
    {
        for (key, value) in entries {
            self.set(key.as_ref(), value)?;
        }
        Ok(())
    }

    /// Remove `key` locally and from the store
    ///
    /// A key that only existed in the write-back cache is not an error;
    /// otherwise an absent key is `KeyNotFound`.
    pub fn delete(&mut self, key: &str) -> Result<()> {
        let store = self.store.as_ref().ok_or(ShelfError::ClosedHandle)?;

        let cached = self.cache.remove(key);
        let was_cached = cached.is_some();

        match delete_remote(store, key, self.config.conflict_retries) {
            Ok(()) => {}
            Err(ShelfError::KeyNotFound(_)) if was_cached => {}
            Err(e) => {
                if let Some(value) = cached {
                    self.cache.insert(key, value);
                }
                return Err(e);
            }
        }

        if self.config.writeback {
            self.state = ShelfState::Dirty;
        }
        Ok(())
    }

    /// Whether `key` is cached locally or present in the store
    pub fn contains(&self, key: &str) -> Result<bool> {
        let store = self.store()?;
        if self.cache.contains(key) {
            return Ok(true);
        }

        match store.get(key) {
            Ok(_) => Ok(true),
            Err(ShelfError::KeyNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Number of distinct keys across the store and the local cache
    pub fn len(&self) -> Result<usize> {
        let snapshot = self.store()?.all()?;

        let mut keys: HashSet<&str> = snapshot.iter().map(|doc| doc.key.as_str()).collect();
        keys.extend(self.cache.keys().map(String::as_str));
        Ok(keys.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Every key, from a fresh snapshot of the store
    pub fn keys(&self) -> Result<Keys> {
        let snapshot = self.snapshot()?;
        Ok(Keys::new(snapshot, &self.cache))
    }

    fn snapshot(&self) -> Result<Vec<Document>> {
        let store = self.store()?;
        let snapshot = store.all()?;
        tracing::debug!(
            "Enumerated {} documents from {}",
            snapshot.len(),
            store.location()
        );
        Ok(snapshot)
    }
}

impl<T, S> Shelf<T, S>
where
    T: Serialize + DeserializeOwned + Clone,
    S: DocumentStore,
{
    /// Value stored under `key`
    ///
    /// In writeback mode this loads the value into the cache (if it is not
    /// there already) and returns a copy of the cached entry.
    pub fn get(&mut self, key: &str) -> Result<T> {
        Ok(self.get_mut(key)?.into_owned())
    }

    /// Every `(key, value)` pair, from a fresh snapshot of the store
    pub fn items(&self) -> Result<Items<'_, T>> {
        let snapshot = self.snapshot()?;
        Ok(Items::new(snapshot, &self.cache))
    }

    /// Every value, from a fresh snapshot of the store
    pub fn values(&self) -> Result<Values<'_, T>> {
        Ok(Values::new(self.items()?))
    }
}

impl<T, S> PersistentMap<T> for Shelf<T, S>
where
    T: Serialize + DeserializeOwned + Clone,
    S: DocumentStore,
{
    type Keys<'a> = Keys where Self: 'a;
    type Values<'a> = Values<'a, T> where Self: 'a;
    type Items<'a> = Items<'a, T> where Self: 'a;

    fn get(&mut self, key: &str) -> Result<T> {
        Shelf::get(self, key)
    }

    fn set(&mut self, key: &str, value: T) -> Result<()> {
        Shelf::set(self, key, value)
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        Shelf::delete(self, key)
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Shelf::contains(self, key)
    }

    fn keys(&self) -> Result<Keys> {
        Shelf::keys(self)
    }

    fn values(&self) -> Result<Values<'_, T>> {
        Shelf::values(self)
    }

    fn items(&self) -> Result<Items<'_, T>> {
        Shelf::items(self)
    }

    fn len(&self) -> Result<usize> {
        Shelf::len(self)
    }
}

impl<T: Serialize, S: DocumentStore> Drop for Shelf<T, S> {
    fn drop(&mut self) {
        if self.state == ShelfState::Closed {
            return;
        }
        if let Err(e) = self.close() {
            tracing::warn!(
                "Dropping shelf on {} with {} unflushed entries: {}",
                self.config.location,
                self.cache.len(),
                e
            );
        }
    }
}

// =============================================================================
// Store Round Trips
// =============================================================================

/// Fetch and decode the value of `key`
fn fetch<T: DeserializeOwned, S: DocumentStore>(store: &S, key: &str) -> Result<T> {
    let document = store.get(key)?;
    tracing::debug!("Fetched {} at revision {}", key, document.revision);
    codec::decode(&document.payload)
}

/// Latest revision of `key`, `None` if it does not exist
fn current_revision<S: DocumentStore>(store: &S, key: &str) -> Result<Option<Revision>> {
    match store.get(key) {
        Ok(document) => Ok(Some(document.revision)),
        Err(ShelfError::KeyNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Write `payload` to `key`, overwriting concurrent changes
///
/// On a conflict the revision is re-read and the write retried, up to
/// `retries` times.
fn write_through<S: DocumentStore>(
    store: &S,
    key: &str,
    payload: String,
    retries: u32,
) -> Result<Document> {
    let mut revision = current_revision(store, key)?;
    let mut attempt = 0;

    loop {
        match store.put(key, payload.clone(), revision.as_ref()) {
            Ok(document) => {
                tracing::debug!("Wrote {} at revision {}", key, document.revision);
                return Ok(document);
            }
            Err(ShelfError::Conflict { .. }) if attempt < retries => {
                attempt += 1;
                tracing::warn!("Conflict writing {}, overwriting (attempt {})", key, attempt);
                revision = current_revision(store, key)?;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Delete `key` at its latest revision, re-reading it after a conflict
fn delete_remote<S: DocumentStore>(store: &S, key: &str, retries: u32) -> Result<()> {
    let mut attempt = 0;

    loop {
        let revision = store.get(key)?.revision;
        match store.delete(key, &revision) {
            Ok(()) => {
                tracing::debug!("Deleted {} at revision {}", key, revision);
                return Ok(());
            }
            Err(ShelfError::Conflict { .. }) if attempt < retries => {
                attempt += 1;
                tracing::warn!("Conflict deleting {}, retrying (attempt {})", key, attempt);
            }
            Err(e) => return Err(e),
        }
    }
}
