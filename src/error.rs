//! Error types for docshelf
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using ShelfError
pub type Result<T> = std::result::Result<T, ShelfError>;

/// Unified error type for docshelf operations
#[derive(Debug, Error)]
pub enum ShelfError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Document update conflict: {key}")]
    Conflict { key: String },

    #[error("Database does not exist: {0}")]
    DatabaseMissing(String),

    #[error("Database already exists: {0}")]
    DatabaseExists(String),

    /// Failure reported by a store client itself: connection refused,
    /// timeout, an unexpected server status. The bundled memory and file
    /// stores never produce it (their failures are `Io` or `Corruption`);
    /// `DocumentStore` implementations talking to a remote database should
    /// map transport errors here. The shelf propagates it unchanged.
    #[error("Store error: {0}")]
    Store(String),

    #[error("Record corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Facade Errors
    // -------------------------------------------------------------------------
    #[error("Operation on a closed shelf")]
    ClosedHandle,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ShelfError {
    fn from(err: serde_json::Error) -> Self {
        ShelfError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for ShelfError {
    fn from(err: bincode::Error) -> Self {
        ShelfError::Serialization(err.to_string())
    }
}

impl ShelfError {
    /// True for a missing key, as opposed to a failed round trip
    pub fn is_not_found(&self) -> bool {
        matches!(self, ShelfError::KeyNotFound(_))
    }

    /// True for a stale-revision rejection
    pub fn is_conflict(&self) -> bool {
        matches!(self, ShelfError::Conflict { .. })
    }
}
