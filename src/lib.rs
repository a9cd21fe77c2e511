//! # docshelf
//!
//! A dictionary-like persistence facade ("shelf") over a document store:
//! - Mapping operations where every key is one revisioned document
//! - Optional write-back mode with in-place mutation of cached values
//! - Last-writer-wins conflict handling on save
//! - Pluggable byte caches with hit/miss accounting for document reads
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Shelf                               │
//! │        (get / set / delete / keys / items / sync)            │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐                ┌─────────────────┐
//!   │ WriteBackCache  │                │      Codec      │
//!   │ (owned values)  │                │     (JSON)      │
//!   └─────────────────┘                └────────┬────────┘
//!                                               │
//!                       ┌───────────────────────▼─────────┐
//!                       │      DocumentStore (trait)       │
//!                       └──┬──────────────┬────────────┬───┘
//!                          │              │            │
//!                          ▼              ▼            ▼
//!                   ┌────────────┐ ┌───────────┐ ┌──────────────┐
//!                   │MemoryStore │ │ FileStore │ │ CachedStore  │
//!                   │            │ │ (records) │ │ (ByteCache)  │
//!                   └────────────┘ └───────────┘ └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod store;
pub mod cache;
pub mod shelf;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ShelfError, Result};
pub use config::ShelfConfig;
pub use shelf::{PersistentMap, Shelf, ShelfState, ValueRef};
pub use store::{DocumentStore, StoreBackend};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of docshelf
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
