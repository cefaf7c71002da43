//! Listing persistence
//!
//! The store exclusively owns persisted listings: ingestion creates them,
//! the availability sweeper destroys them, nothing mutates them.

pub mod repository;

pub use repository::{
    InsertOutcome, ListingStore, MemoryListingStore, SqliteListingStore, StoreResult,
};

use std::path::Path;
use std::sync::Arc;

/// Open the SQLite store at `path` behind the store trait
pub fn open_sqlite(path: impl AsRef<Path>) -> StoreResult<Arc<dyn ListingStore>> {
    Ok(Arc::new(SqliteListingStore::new(path)?))
}
