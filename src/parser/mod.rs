//! HTML parsing and data extraction
//!
//! Source-specific extraction is implemented directly on [`SourceKind`]:
//!
//! - [`SourceKind::parse_listings`] - listing candidates from a result page
//! - [`SourceKind::resolve_url`] - absolute URL for a listing link
//! - [`SourceKind::detect_removed`] - "no longer available" marker on a listing page
//!
//! Parsing is synchronous and CPU-bound; async callers run it through
//! [`parse_listings_blocking`] and [`detect_removed_blocking`] so it never
//! stalls in-flight fetches.

pub mod availability;
pub mod listing;
pub mod selectors;

pub use selectors::ListingSelectors;

use crate::models::{ListingCandidate, SourceKind};

/// Run [`SourceKind::parse_listings`] on the blocking pool
pub async fn parse_listings_blocking(
    kind: SourceKind,
    html: String,
) -> Result<Vec<ListingCandidate>, tokio::task::JoinError> {
    tokio::task::spawn_blocking(move || kind.parse_listings(&html)).await
}

/// Run [`SourceKind::detect_removed`] on the blocking pool
pub async fn detect_removed_blocking(
    kind: SourceKind,
    html: String,
) -> Result<bool, tokio::task::JoinError> {
    tokio::task::spawn_blocking(move || kind.detect_removed(&html)).await
}
