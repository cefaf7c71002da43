//! Listing store abstraction
//!
//! Ingestion and the availability sweeper only talk to the
//! [`ListingStore`] trait, so the backend can be swapped:
//!
//! ```text
//!   ingest ──┐                 ┌──▶ SqliteListingStore  (production)
//!            ├──▶ ListingStore ┤
//!   sweep ───┘                 └──▶ MemoryListingStore  (tests, dry runs)
//! ```
//!
//! Uniqueness of `url` is enforced by the backend itself (`UNIQUE` column,
//! write-locked map), never by a separate check, so concurrent inserts of the
//! same URL resolve to exactly one row.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{Listing, SourceKind};
use crate::utils::error::StoreError;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Outcome of an atomic insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The listing was stored
    Inserted,
    /// A listing with the same URL already existed; nothing was written
    Duplicate,
}

// ============================================================================
// Repository Trait
// ============================================================================

/// Persistent set of listings keyed by URL
pub trait ListingStore: Send + Sync {
    /// Look up a listing by URL
    fn find(&self, url: &str) -> StoreResult<Option<Listing>>;

    /// Insert unless a listing with the same URL exists
    fn insert_if_absent(&self, listing: &Listing) -> StoreResult<InsertOutcome>;

    /// Delete by URL, returning whether a row was removed
    fn delete(&self, url: &str) -> StoreResult<bool>;

    /// Snapshot of every stored listing
    fn list_all(&self) -> StoreResult<Vec<Listing>>;

    /// Number of stored listings
    fn count(&self) -> StoreResult<usize>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of [`ListingStore`]
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteListingStore {
    conn: Mutex<Connection>,
}

impl SqliteListingStore {
    /// Open (or create) the database at `path`
    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // WAL lets the sweeper read while ingestion writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite listing store initialized");
        Ok(store)
    }

    /// Create in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn create_schema(&self) -> StoreResult<()> {
        self.conn()?.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS listings (
                    url TEXT PRIMARY KEY NOT NULL,
                    title TEXT,
                    price TEXT,
                    area TEXT,
                    rooms TEXT,
                    source TEXT,
                    first_seen_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_listings_source
                    ON listings(source);
                "#,
        )?;
        Ok(())
    }

    fn row_to_listing(row: &Row<'_>) -> rusqlite::Result<Listing> {
        let url: String = row.get(0)?;
        let source = row
            .get::<_, Option<String>>(5)?
            .as_deref()
            .and_then(SourceKind::parse)
            .or_else(|| SourceKind::from_url(&url));
        let first_seen_at = DateTime::parse_from_rfc3339(&row.get::<_, String>(6)?)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Listing {
            url,
            title: row.get(1)?,
            price: row.get(2)?,
            area: row.get(3)?,
            rooms: row.get(4)?,
            source,
            first_seen_at,
        })
    }
}

impl ListingStore for SqliteListingStore {
    fn find(&self, url: &str) -> StoreResult<Option<Listing>> {
        let conn = self.conn()?;
        let listing = conn
            .query_row(
                "SELECT url, title, price, area, rooms, source, first_seen_at
                 FROM listings WHERE url = ?1",
                params![url],
                Self::row_to_listing,
            )
            .optional()?;
        Ok(listing)
    }

    fn insert_if_absent(&self, listing: &Listing) -> StoreResult<InsertOutcome> {
        let conn = self.conn()?;
        let changed = conn.execute(
            r#"
                INSERT OR IGNORE INTO listings (url, title, price, area, rooms, source, first_seen_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            params![
                listing.url,
                listing.title,
                listing.price,
                listing.area,
                listing.rooms,
                listing.source.map(|s| s.as_str()),
                listing.first_seen_at.to_rfc3339(),
            ],
        )?;

        Ok(if changed == 0 {
            InsertOutcome::Duplicate
        } else {
            InsertOutcome::Inserted
        })
    }

    fn delete(&self, url: &str) -> StoreResult<bool> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM listings WHERE url = ?1", params![url])?;
        Ok(removed > 0)
    }

    fn list_all(&self) -> StoreResult<Vec<Listing>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT url, title, price, area, rooms, source, first_seen_at
             FROM listings ORDER BY first_seen_at",
        )?;
        let listings = stmt
            .query_map([], Self::row_to_listing)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(listings)
    }

    fn count(&self) -> StoreResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

// ============================================================================
// In-Memory Implementation
// ============================================================================

/// In-memory implementation of [`ListingStore`]
///
/// Check-then-insert happens under one write lock.
#[derive(Default)]
pub struct MemoryListingStore {
    listings: RwLock<HashMap<String, Listing>>,
}

impl MemoryListingStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl ListingStore for MemoryListingStore {
    fn find(&self, url: &str) -> StoreResult<Option<Listing>> {
        let listings = self.listings.read().map_err(|_| StoreError::Poisoned)?;
        Ok(listings.get(url).cloned())
    }

    fn insert_if_absent(&self, listing: &Listing) -> StoreResult<InsertOutcome> {
        let mut listings = self.listings.write().map_err(|_| StoreError::Poisoned)?;
        if listings.contains_key(&listing.url) {
            return Ok(InsertOutcome::Duplicate);
        }
        listings.insert(listing.url.clone(), listing.clone());
        Ok(InsertOutcome::Inserted)
    }

    fn delete(&self, url: &str) -> StoreResult<bool> {
        let mut listings = self.listings.write().map_err(|_| StoreError::Poisoned)?;
        Ok(listings.remove(url).is_some())
    }

    fn list_all(&self) -> StoreResult<Vec<Listing>> {
        let listings = self.listings.read().map_err(|_| StoreError::Poisoned)?;
        let mut all: Vec<Listing> = listings.values().cloned().collect();
        all.sort_by(|a, b| a.first_seen_at.cmp(&b.first_seen_at));
        Ok(all)
    }

    fn count(&self) -> StoreResult<usize> {
        let listings = self.listings.read().map_err(|_| StoreError::Poisoned)?;
        Ok(listings.len())
    }
}

// ============================================================================
// Tests
// ============================================================================
