//! File-backed document store
//!
//! One directory per database, one file per document.
//!
//! ## Record Format
//! ```text
//! ┌─────────┬─────────┬──────────────────────────────┐
//! │ CRC (4) │ Len (4) │ bincode(Document)            │
//! └─────────┴─────────┴──────────────────────────────┘
//! ```
//! A document lives in `k{hex(key)}.doc`. The `k` prefix keeps the empty key
//! from mapping to a dotfile; keys longer than [`MAX_KEY_LEN`] bytes would
//! overflow common file name limits and are rejected with
//! `ShelfError::Config`.
//!
//! CRC and length are little-endian; the CRC covers the encoded document.
//! Files are written to a temporary name and renamed into place, so readers
//! only ever see complete records.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, ShelfError};

use super::{
    check_revision, generate_key, BulkResult, Document, DocumentStore, NewDocument, Revision,
    StoreBackend,
};

/// Header size: 4 bytes CRC + 4 bytes length
pub const RECORD_HEADER_SIZE: usize = 8;

/// Longest key, in bytes, a file store accepts
pub const MAX_KEY_LEN: usize = 100;

const DOC_PREFIX: char = 'k';
const DOC_EXTENSION: &str = "doc";

/// Root directory holding file-backed databases
///
/// ## Concurrency:
/// - `locks`: one mutex per location, shared by every store connected
///   through this backend; it serialises the read-check-write of a write
/// - Reads take no lock (documents are replaced by atomic rename)
#[derive(Clone)]
pub struct FileBackend {
    data_dir: PathBuf,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl FileBackend {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn db_dir(&self, location: &str) -> Result<PathBuf> {
        let valid = !location.is_empty()
            && location != "."
            && location != ".."
            && !location.contains(['/', '\\']);
        if !valid {
            return Err(ShelfError::Config(format!(
                "invalid database name for a file store: {:?}",
                location
            )));
        }
        Ok(self.data_dir.join(location))
    }

    fn lock_for(&self, location: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(location.to_string()).or_default())
    }
}

impl StoreBackend for FileBackend {
    type Store = FileStore;

    fn connect(&self, location: &str) -> Result<FileStore> {
        Ok(FileStore {
            dir: self.db_dir(location)?,
            location: location.to_string(),
            write_lock: self.lock_for(location),
        })
    }

    fn create_db(&self, location: &str) -> Result<()> {
        let dir = self.db_dir(location)?;
        if dir.is_dir() {
            return Err(ShelfError::DatabaseExists(location.to_string()));
        }
        fs::create_dir_all(&dir)?;
        tracing::debug!("Created database directory {}", dir.display());
        Ok(())
    }

    fn delete_db(&self, location: &str) -> Result<()> {
        let dir = self.db_dir(location)?;
        let lock = self.lock_for(location);
        let _guard = lock.lock();
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::debug!("Deleted database directory {}", dir.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ShelfError::DatabaseMissing(location.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn db_exists(&self, location: &str) -> Result<bool> {
        Ok(self.db_dir(location)?.is_dir())
    }
}

/// A connection to one file-backed database
pub struct FileStore {
    dir: PathBuf,
    location: String,
    write_lock: Arc<Mutex<()>>,
}

impl FileStore {
    fn ensure_exists(&self) -> Result<()> {
        if self.dir.is_dir() {
            Ok(())
        } else {
            Err(ShelfError::DatabaseMissing(self.location.clone()))
        }
    }

    fn doc_path(&self, key: &str) -> Result<PathBuf> {
        if key.len() > MAX_KEY_LEN {
            return Err(ShelfError::Config(format!(
                "key of {} bytes exceeds the file store limit of {}",
                key.len(),
                MAX_KEY_LEN
            )));
        }
        let mut name = String::with_capacity(2 + 2 * key.len() + DOC_EXTENSION.len());
        name.push(DOC_PREFIX);
        for b in key.bytes() {
            name.push_str(&format!("{:02x}", b));
        }
        name.push('.');
        name.push_str(DOC_EXTENSION);
        Ok(self.dir.join(name))
    }

    /// Read a record, `None` if the file does not exist
    fn read_record(path: &Path) -> Result<Option<Document>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        decode_record(&bytes, path).map(Some)
    }

    fn write_record(&self, path: &Path, document: &Document) -> Result<()> {
        static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

        let bytes = encode_record(document)?;
        let tmp = path.with_extension(format!(
            "tmp-{}-{}",
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, &bytes)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

impl DocumentStore for FileStore {
    fn location(&self) -> &str {
        &self.location
    }

    fn get(&self, key: &str) -> Result<Document> {
        self.ensure_exists()?;
        Self::read_record(&self.doc_path(key)?)?
            .ok_or_else(|| ShelfError::KeyNotFound(key.to_string()))
    }

    fn put(&self, key: &str, payload: String, revision: Option<&Revision>) -> Result<Document> {
        let _guard = self.write_lock.lock();
        self.ensure_exists()?;

        let path = self.doc_path(key)?;
        let current = Self::read_record(&path)?.map(|doc| doc.revision);
        check_revision(key, current.as_ref(), revision)?;

        let document = Document {
            key: key.to_string(),
            revision: Revision::next(current.as_ref(), &payload),
            payload,
        };
        self.write_record(&path, &document)?;
        Ok(document)
    }

    fn delete(&self, key: &str, revision: &Revision) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.ensure_exists()?;

        let path = self.doc_path(key)?;
        let current = Self::read_record(&path)?
            .map(|doc| doc.revision)
            .ok_or_else(|| ShelfError::KeyNotFound(key.to_string()))?;
        check_revision(key, Some(&current), Some(revision))?;

        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ShelfError::KeyNotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn create(&self, documents: Vec<NewDocument>) -> Result<Vec<BulkResult>> {
        let _guard = self.write_lock.lock();
        self.ensure_exists()?;

        let mut results = Vec::with_capacity(documents.len());
        for doc in documents {
            let key = doc.key.unwrap_or_else(generate_key);
            let path = match self.doc_path(&key) {
                Ok(path) => path,
                Err(e) => {
                    results.push(BulkResult {
                        outcome: Err(e.to_string()),
                        key,
                    });
                    continue;
                }
            };

            if path.exists() {
                results.push(BulkResult {
                    outcome: Err(format!("document update conflict: {}", key)),
                    key,
                });
                continue;
            }

            let document = Document {
                key: key.clone(),
                revision: Revision::next(None, &doc.payload),
                payload: doc.payload,
            };
            let outcome = match self.write_record(&path, &document) {
                Ok(()) => Ok(document.revision),
                Err(e) => Err(e.to_string()),
            };
            results.push(BulkResult { key, outcome });
        }

        Ok(results)
    }

    fn all(&self) -> Result<Vec<Document>> {
        self.ensure_exists()?;

        let mut documents = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_doc = path.extension().and_then(|e| e.to_str()) == Some(DOC_EXTENSION)
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |n| n.starts_with(DOC_PREFIX));
            if !is_doc {
                continue;
            }
            // Removed by another writer since read_dir listed it
            if let Some(document) = Self::read_record(&path)? {
                documents.push(document);
            }
        }

        documents.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(documents)
    }
}

// =============================================================================
// Record Encoding/Decoding
// =============================================================================

/// Encode a document as a checksummed record
pub fn encode_record(document: &Document) -> Result<Vec<u8>> {
    let data = bincode::serialize(document)?;
    let crc = crc32fast::hash(&data);

    let mut record = Vec::with_capacity(RECORD_HEADER_SIZE + data.len());
    record.extend_from_slice(&crc.to_le_bytes());
    record.extend_from_slice(&(data.len() as u32).to_le_bytes());
    record.extend_from_slice(&data);
    Ok(record)
}

/// Decode a checksummed record, validating length and CRC
fn decode_record(bytes: &[u8], path: &Path) -> Result<Document> {
    if bytes.len() < RECORD_HEADER_SIZE {
        return Err(ShelfError::Corruption(format!(
            "{}: truncated header ({} bytes)",
            path.display(),
            bytes.len()
        )));
    }

    let crc = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let data = &bytes[RECORD_HEADER_SIZE..];

    if data.len() != len {
        return Err(ShelfError::Corruption(format!(
            "{}: expected {} data bytes, found {}",
            path.display(),
            len,
            data.len()
        )));
    }
    if crc32fast::hash(data) != crc {
        return Err(ShelfError::Corruption(format!(
            "{}: checksum mismatch",
            path.display()
        )));
    }

    Ok(bincode::deserialize(data)?)
}
