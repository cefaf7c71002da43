//! Availability sweeper
//!
//! Re-fetches every stored listing and deletes the ones whose page shows the
//! source's "no longer available" marker. Each listing is checked
//! independently:
//!
//! ```text
//! Pending ──unknown source──────────────────────▶ Unsupported (kept)
//!    │
//!    └──fetch──┬──error / non-2xx───────────────▶ Unverified  (kept)
//!              │
//!              └──Fetched──┬──marker absent─────▶ Live        (kept)
//!                          └──marker present────▶ Removed     (deleted)
//! ```
//!
//! Only positive evidence of removal deletes a listing. Failing to fetch a
//! page says nothing about the offer, so the listing stays.

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::crawler::{fetch_page, Fetch, FetchRequest, SourceAdapter};
use crate::error::{Error, Result};
use crate::metrics;
use crate::models::SourceKind;
use crate::parser::detect_removed_blocking;
use crate::storage::ListingStore;
use crate::utils::error::FetchError;
use crate::utils::retry::RetryConfig;

/// Final state of one availability check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListingState {
    /// Page fetched, no removal marker
    Live,
    /// Page fetched, removal marker present; the listing was deleted
    Removed,
    /// URL belongs to no known source; kept without fetching
    Unsupported,
    /// Page could not be fetched; kept
    Unverified,
}

impl ListingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingState::Live => "live",
            ListingState::Removed => "removed",
            ListingState::Unsupported => "unsupported",
            ListingState::Unverified => "unverified",
        }
    }

    /// Whether the listing stays in the store
    pub fn is_retained(&self) -> bool {
        !matches!(self, ListingState::Removed)
    }
}

/// Per-sweep counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: u64,
    pub live: u64,
    pub removed: u64,
    pub unsupported: u64,
    pub unverified: u64,
}

impl SweepReport {
    fn record(&mut self, state: ListingState) {
        self.checked += 1;
        match state {
            ListingState::Live => self.live += 1,
            ListingState::Removed => self.removed += 1,
            ListingState::Unsupported => self.unsupported += 1,
            ListingState::Unverified => self.unverified += 1,
        }
    }
}

/// Concurrent revalidation of stored listings
pub struct AvailabilitySweeper {
    store: Arc<dyn ListingStore>,
    fetcher: Arc<dyn Fetch>,
    concurrency: usize,
    adapters: HashMap<SourceKind, Arc<SourceAdapter>>,
}

impl AvailabilitySweeper {
    /// Create a sweeper checking at most `concurrency` listings at a time
    pub fn new(store: Arc<dyn ListingStore>, fetcher: Arc<dyn Fetch>, concurrency: usize) -> Self {
        Self {
            store,
            fetcher,
            concurrency: concurrency.max(1),
            adapters: HashMap::new(),
        }
    }

    /// Fetch listing pages through these adapters' politeness policy
    ///
    /// Sources without an adapter are fetched directly with a plain request.
    pub fn with_adapters(mut self, adapters: impl IntoIterator<Item = Arc<SourceAdapter>>) -> Self {
        self.adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.kind(), adapter))
            .collect();
        self
    }

    /// Run one sweep and return the number of removed listings
    pub async fn sweep(&self, cancel: CancellationToken) -> Result<u64> {
        Ok(self.sweep_with_report(cancel).await?.removed)
    }

    /// Run one sweep over every stored listing
    ///
    /// # Errors
    ///
    /// `Error::Store` if the store fails (deletes already committed stand),
    /// `Error::Cancelled` if `cancel` fired; no delete is committed after that.
    pub async fn sweep_with_report(&self, cancel: CancellationToken) -> Result<SweepReport> {
        let listings = self.store.list_all()?;
        tracing::info!(
            listings = listings.len(),
            concurrency = self.concurrency,
            "Starting availability sweep"
        );

        let mut checks = stream::iter(listings)
            .map(|listing| {
                let cancel = cancel.clone();
                async move { self.check(&listing.url, &cancel).await }
            })
            .buffer_unordered(self.concurrency);

        let mut report = SweepReport::default();
        while let Some(checked) = checks.next().await {
            match checked? {
                Some(state) => {
                    metrics::record_sweep(state.as_str());
                    report.record(state);
                }
                None => {
                    tracing::info!(checked = report.checked, removed = report.removed, "Sweep cancelled");
                    return Err(Error::Cancelled);
                }
            }
        }

        tracing::info!(
            checked = report.checked,
            live = report.live,
            removed = report.removed,
            unsupported = report.unsupported,
            unverified = report.unverified,
            "Availability sweep finished"
        );
        Ok(report)
    }

    /// Check one listing; `None` when cancelled before a verdict
    async fn check(&self, url: &str, cancel: &CancellationToken) -> Result<Option<ListingState>> {
        let Some(kind) = SourceKind::from_url(url) else {
            tracing::warn!(url = %url, "No source recognises listing URL, keeping it");
            return Ok(Some(ListingState::Unsupported));
        };

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            fetched = self.fetch(kind, url) => fetched,
        };

        let body = match fetched {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(source = %kind, url = %url, error = %e, "Could not verify listing, keeping it");
                return Ok(Some(ListingState::Unverified));
            }
        };

        let removed = match detect_removed_blocking(kind, body).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::error!(url = %url, error = %e, "Removal detection task failed");
                return Ok(Some(ListingState::Unverified));
            }
        };

        if !removed {
            tracing::debug!(source = %kind, url = %url, "Listing still live");
            return Ok(Some(ListingState::Live));
        }

        if cancel.is_cancelled() {
            return Ok(None);
        }
        self.store.delete(url)?;
        tracing::info!(source = %kind, url = %url, "Listing no longer available, deleted");
        Ok(Some(ListingState::Removed))
    }

    async fn fetch(&self, kind: SourceKind, url: &str) -> std::result::Result<String, FetchError> {
        match self.adapters.get(&kind) {
            Some(adapter) => adapter.fetch(self.fetcher.as_ref(), url).await,
            None => {
                fetch_page(
                    self.fetcher.as_ref(),
                    &FetchRequest::get(url),
                    &RetryConfig::none(),
                )
                .await
            }
        }
    }
}
