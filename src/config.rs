//! Configuration for docshelf
//!
//! Every shelf is opened against an explicit config; there is no
//! process-wide default location.

use crate::error::{Result, ShelfError};

/// Configuration for opening a [`Shelf`](crate::Shelf)
#[derive(Debug, Clone)]
pub struct ShelfConfig {
    // -------------------------------------------------------------------------
    // Store Configuration
    // -------------------------------------------------------------------------
    /// Database location the shelf is bound to (a database name or URL,
    /// interpreted by the backend)
    pub location: String,

    /// Create the database on open when it does not exist yet
    pub create_if_missing: bool,

    // -------------------------------------------------------------------------
    // Write Configuration
    // -------------------------------------------------------------------------
    /// Buffer values locally until `sync()`/`close()`
    pub writeback: bool,

    /// How many times a write re-reads the revision and retries after a
    /// conflict before giving up
    pub conflict_retries: u32,
}

impl Default for ShelfConfig {
    fn default() -> Self {
        Self {
            location: "shelve".to_string(),
            create_if_missing: true,
            writeback: false,
            conflict_retries: 1,
        }
    }
}

impl ShelfConfig {
    /// Config bound to `location` with default settings
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Self::default()
        }
    }

    /// Create a new config builder
    pub fn builder() -> ShelfConfigBuilder {
        ShelfConfigBuilder::default()
    }

    /// Reject settings no backend can work with
    pub fn validate(&self) -> Result<()> {
        if self.location.trim().is_empty() {
            return Err(ShelfError::Config("location must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Builder for ShelfConfig
#[derive(Default)]
pub struct ShelfConfigBuilder {
    config: ShelfConfig,
}

impl ShelfConfigBuilder {
    /// Set the database location
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.config.location = location.into();
        self
    }

    /// Enable or disable write-back mode
    pub fn writeback(mut self, enabled: bool) -> Self {
        self.config.writeback = enabled;
        self
    }

    /// Create the database on open if it is missing
    pub fn create_if_missing(mut self, enabled: bool) -> Self {
        self.config.create_if_missing = enabled;
        self
    }

    /// Set the number of conflict retries per write
    pub fn conflict_retries(mut self, retries: u32) -> Self {
        self.config.conflict_retries = retries;
        self
    }

    pub fn build(self) -> ShelfConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = ShelfConfig::builder()
            .location("inventory")
            .writeback(true)
            .conflict_retries(3)
            .build();

        assert_eq!(config.location, "inventory");
        assert!(config.writeback);
        assert!(config.create_if_missing);
        assert_eq!(config.conflict_retries, 3);
    }

    #[test]
    fn test_empty_location_rejected() {
        let config = ShelfConfig::new("  ");
        assert!(matches!(config.validate(), Err(ShelfError::Config(_))));
    }
}
