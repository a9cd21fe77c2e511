//! Store Module
//!
//! The contract of the remote document store a shelf persists into.
//!
//! ## Responsibilities
//! - Key-addressed documents carrying an opaque revision token
//! - Optimistic concurrency: writes must quote the latest revision
//! - Bulk create with per-document results
//! - Full enumeration of the current documents
//! - Database lifecycle (create/delete/exists) per location
//!
//! ## Revision Format
//! ```text
//! ┌──────────────┬───┬──────────────────────────┐
//! │ generation   │ - │ CRC32 of payload (8 hex) │
//! └──────────────┴───┴──────────────────────────┘
//! ```
//! The generation grows by one on every successful write of a key.

mod file;
mod memory;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShelfError};

pub use file::{FileBackend, FileStore, MAX_KEY_LEN};
pub use memory::{MemoryBackend, MemoryStore};

/// Opaque version marker of a stored document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Revision(String);

impl Revision {
    /// Revision following `previous` for a document holding `payload`
    pub fn next(previous: Option<&Revision>, payload: &str) -> Self {
        let generation = previous.map(Revision::generation).unwrap_or(0) + 1;
        let checksum = crc32fast::hash(payload.as_bytes());
        Revision(format!("{}-{:08x}", generation, checksum))
    }

    /// Numeric generation prefix (0 if the token is not in the usual format)
    pub fn generation(&self) -> u64 {
        self.0
            .split('-')
            .next()
            .and_then(|g| g.parse().ok())
            .unwrap_or(0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Revision {
    fn from(token: String) -> Self {
        Revision(token)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier, unique within a database
    pub key: String,

    /// Revision of this version of the document
    pub revision: Revision,

    /// Serialized value
    pub payload: String,
}

/// A document submitted to [`DocumentStore::create`]
#[derive(Debug, Clone)]
pub struct NewDocument {
    /// Identifier; a fresh one is generated when absent
    pub key: Option<String>,

    pub payload: String,
}

impl NewDocument {
    pub fn new(key: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            payload: payload.into(),
        }
    }

    /// Document whose identifier is chosen by the store
    pub fn anonymous(payload: impl Into<String>) -> Self {
        Self {
            key: None,
            payload: payload.into(),
        }
    }
}

/// Per-document outcome of a bulk create
#[derive(Debug, Clone)]
pub struct BulkResult {
    pub key: String,

    /// New revision, or the reason the document was rejected
    pub outcome: std::result::Result<Revision, String>,
}

impl BulkResult {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Operations a shelf consumes from a document database
///
/// Implementations are shared between threads; every method takes `&self`.
pub trait DocumentStore: Send + Sync {
    /// Location (database name) this store is bound to
    fn location(&self) -> &str;

    /// Fetch the current version of a document
    ///
    /// Returns `ShelfError::KeyNotFound` when the key is absent.
    fn get(&self, key: &str) -> Result<Document>;

    /// Current revision of a document, without its payload
    ///
    /// Same errors as [`DocumentStore::get`]. Stores that can answer
    /// without loading the payload should override this.
    fn revision(&self, key: &str) -> Result<Revision> {
        self.get(key).map(|doc| doc.revision)
    }

    /// Write a document
    ///
    /// `revision` must be the latest revision of an existing document and
    /// `None` for a new one; anything else is `ShelfError::Conflict`.
    fn put(&self, key: &str, payload: String, revision: Option<&Revision>) -> Result<Document>;

    /// Delete a document at its latest revision
    fn delete(&self, key: &str, revision: &Revision) -> Result<()>;

    /// Create many documents; failures are reported per document
    fn create(&self, documents: Vec<NewDocument>) -> Result<Vec<BulkResult>>;

    /// Snapshot of every document in the database
    fn all(&self) -> Result<Vec<Document>>;
}

/// Connects to databases and manages their lifecycle
pub trait StoreBackend {
    type Store: DocumentStore;

    /// Bind a store to `location`
    fn connect(&self, location: &str) -> Result<Self::Store>;

    fn create_db(&self, location: &str) -> Result<()>;

    fn delete_db(&self, location: &str) -> Result<()>;

    fn db_exists(&self, location: &str) -> Result<bool>;
}

/// Optimistic-concurrency check shared by the store implementations
///
/// `current` is the stored revision (if the key exists), `supplied` what the
/// writer quoted.
pub(crate) fn check_revision(
    key: &str,
    current: Option<&Revision>,
    supplied: Option<&Revision>,
) -> Result<()> {
    match (current, supplied) {
        (None, None) => Ok(()),
        (Some(current), Some(supplied)) if current == supplied => Ok(()),
        _ => Err(ShelfError::Conflict {
            key: key.to_string(),
        }),
    }
}

/// Identifier for documents created without a key
pub(crate) fn generate_key() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:016x}{:08x}", nanos, seq)
}
