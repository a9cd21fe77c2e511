//! In-memory document store
//!
//! A process-local stand-in for a document database server. Every store
//! connected through clones of the same [`MemoryBackend`] sees the same data.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Result, ShelfError};

use super::{
    check_revision, generate_key, BulkResult, Document, DocumentStore, NewDocument, Revision,
    StoreBackend,
};

type Database = HashMap<String, Document>;

/// Shared in-memory server holding any number of databases
///
/// ## Concurrency:
/// - `databases`: one RwLock over all databases (readers run concurrently,
///   each write is atomic with respect to its revision check)
#[derive(Clone, Default)]
pub struct MemoryBackend {
    databases: Arc<RwLock<HashMap<String, Database>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreBackend for MemoryBackend {
    type Store = MemoryStore;

    fn connect(&self, location: &str) -> Result<MemoryStore> {
        Ok(MemoryStore {
            databases: Arc::clone(&self.databases),
            location: location.to_string(),
        })
    }

    fn create_db(&self, location: &str) -> Result<()> {
        let mut databases = self.databases.write();
        if databases.contains_key(location) {
            return Err(ShelfError::DatabaseExists(location.to_string()));
        }
        databases.insert(location.to_string(), Database::new());
        tracing::debug!("Created in-memory database {}", location);
        Ok(())
    }

    fn delete_db(&self, location: &str) -> Result<()> {
        match self.databases.write().remove(location) {
            Some(_) => {
                tracing::debug!("Deleted in-memory database {}", location);
                Ok(())
            }
            None => Err(ShelfError::DatabaseMissing(location.to_string())),
        }
    }

    fn db_exists(&self, location: &str) -> Result<bool> {
        Ok(self.databases.read().contains_key(location))
    }
}

/// A connection to one database of a [`MemoryBackend`]
#[derive(Clone)]
pub struct MemoryStore {
    databases: Arc<RwLock<HashMap<String, Database>>>,
    location: String,
}

impl MemoryStore {
    fn missing(&self) -> ShelfError {
        ShelfError::DatabaseMissing(self.location.clone())
    }

    /// Number of documents currently stored
    pub fn len(&self) -> Result<usize> {
        let databases = self.databases.read();
        let db = databases.get(&self.location).ok_or_else(|| self.missing())?;
        Ok(db.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl DocumentStore for MemoryStore {
    fn location(&self) -> &str {
        &self.location
    }

    fn get(&self, key: &str) -> Result<Document> {
        let databases = self.databases.read();
        let db = databases.get(&self.location).ok_or_else(|| self.missing())?;
        db.get(key)
            .cloned()
            .ok_or_else(|| ShelfError::KeyNotFound(key.to_string()))
    }

    fn revision(&self, key: &str) -> Result<Revision> {
        let databases = self.databases.read();
        let db = databases.get(&self.location).ok_or_else(|| self.missing())?;
        db.get(key)
            .map(|doc| doc.revision.clone())
            .ok_or_else(|| ShelfError::KeyNotFound(key.to_string()))
    }

    fn put(&self, key: &str, payload: String, revision: Option<&Revision>) -> Result<Document> {
        let mut databases = self.databases.write();
        let db = databases
            .get_mut(&self.location)
            .ok_or_else(|| ShelfError::DatabaseMissing(self.location.clone()))?;

        let current = db.get(key).map(|doc| &doc.revision);
        check_revision(key, current, revision)?;

        let document = Document {
            key: key.to_string(),
            revision: Revision::next(current, &payload),
            payload,
        };
        db.insert(key.to_string(), document.clone());
        Ok(document)
    }

    fn delete(&self, key: &str, revision: &Revision) -> Result<()> {
        let mut databases = self.databases.write();
        let db = databases
            .get_mut(&self.location)
            .ok_or_else(|| ShelfError::DatabaseMissing(self.location.clone()))?;

        let current = db
            .get(key)
            .map(|doc| &doc.revision)
            .ok_or_else(|| ShelfError::KeyNotFound(key.to_string()))?;
        check_revision(key, Some(current), Some(revision))?;

        db.remove(key);
        Ok(())
    }

    fn create(&self, documents: Vec<NewDocument>) -> Result<Vec<BulkResult>> {
        let mut databases = self.databases.write();
        let db = databases
            .get_mut(&self.location)
            .ok_or_else(|| ShelfError::DatabaseMissing(self.location.clone()))?;

        let results = documents
            .into_iter()
            .map(|doc| {
                let key = doc.key.unwrap_or_else(generate_key);
                if db.contains_key(&key) {
                    return BulkResult {
                        outcome: Err(format!("document update conflict: {}", key)),
                        key,
                    };
                }

                let revision = Revision::next(None, &doc.payload);
                db.insert(
                    key.clone(),
                    Document {
                        key: key.clone(),
                        revision: revision.clone(),
                        payload: doc.payload,
                    },
                );
                BulkResult {
                    key,
                    outcome: Ok(revision),
                }
            })
            .collect();

        Ok(results)
    }

    fn all(&self) -> Result<Vec<Document>> {
        let databases = self.databases.read();
        let db = databases.get(&self.location).ok_or_else(|| self.missing())?;
        let mut documents: Vec<Document> = db.values().cloned().collect();
        documents.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(documents)
    }
}
