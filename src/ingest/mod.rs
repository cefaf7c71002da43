//! Ingestion pipeline
//!
//! Consumes the candidate stream, stores each listing at most once and
//! queues a notification for every listing stored for the first time.
//!
//! ```text
//! candidate ──▶ dedup key? ──no──▶ Rejected
//!                   │yes
//!                   ▼
//!              find(url) ──hit──▶ AlreadyExists
//!                   │miss
//!                   ▼
//!          insert_if_absent ──dup──▶ AlreadyExists
//!                   │inserted
//!                   ▼
//!            dispatch notification ──▶ Inserted
//! ```

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::metrics;
use crate::models::ListingCandidate;
use crate::notifications::{DispatchHandle, Notification};
use crate::storage::{InsertOutcome, ListingStore};

/// Result of ingesting one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Stored for the first time; a notification was queued
    Inserted,
    /// A listing with this URL is already stored
    AlreadyExists,
    /// The candidate has no usable URL and was dropped
    Rejected,
}

impl IngestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestOutcome::Inserted => "inserted",
            IngestOutcome::AlreadyExists => "already_exists",
            IngestOutcome::Rejected => "rejected",
        }
    }
}

/// Per-cycle ingestion counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub inserted: u64,
    pub already_exists: u64,
    pub rejected: u64,
}

impl IngestReport {
    fn record(&mut self, outcome: IngestOutcome) {
        match outcome {
            IngestOutcome::Inserted => self.inserted += 1,
            IngestOutcome::AlreadyExists => self.already_exists += 1,
            IngestOutcome::Rejected => self.rejected += 1,
        }
    }

    /// Total candidates processed
    pub fn total(&self) -> u64 {
        self.inserted + self.already_exists + self.rejected
    }
}

/// Deduplicating store-and-notify stage
pub struct IngestionPipeline {
    store: Arc<dyn ListingStore>,
    notifications: DispatchHandle,
    topic: String,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn ListingStore>,
        notifications: DispatchHandle,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            store,
            notifications,
            topic: topic.into(),
        }
    }

    /// Ingest one candidate
    ///
    /// # Errors
    ///
    /// Store failures are returned as `Error::Store`; the caller aborts the
    /// cycle. A failed notification is logged and never undoes the insert.
    pub fn ingest(&self, candidate: ListingCandidate) -> Result<IngestOutcome> {
        let outcome = self.ingest_inner(candidate)?;
        metrics::record_ingest(outcome.as_str());
        Ok(outcome)
    }

    fn ingest_inner(&self, candidate: ListingCandidate) -> Result<IngestOutcome> {
        let Some(listing) = candidate.clone().into_listing() else {
            tracing::warn!(candidate = ?candidate, "Rejecting candidate without URL");
            return Ok(IngestOutcome::Rejected);
        };

        if self.store.find(&listing.url)?.is_some() {
            tracing::debug!(url = %listing.url, "Listing already stored, skipping");
            return Ok(IngestOutcome::AlreadyExists);
        }

        match self.store.insert_if_absent(&listing)? {
            InsertOutcome::Duplicate => {
                // lost a race against a concurrent insert of the same URL
                tracing::debug!(url = %listing.url, "Listing inserted concurrently, skipping");
                Ok(IngestOutcome::AlreadyExists)
            }
            InsertOutcome::Inserted => {
                tracing::info!(url = %listing.url, title = ?listing.title, "New listing stored");

                let notification = Notification::new_listing(&self.topic, &listing);
                if let Err(e) = self.notifications.dispatch(notification) {
                    tracing::warn!(url = %listing.url, error = %e, "Notification not queued");
                }
                Ok(IngestOutcome::Inserted)
            }
        }
    }

    /// Drain a candidate stream until it closes or `cancel` fires
    ///
    /// Stops at the first store failure; listings ingested before it stay
    /// stored.
    pub async fn consume(
        &self,
        mut candidates: mpsc::Receiver<ListingCandidate>,
        cancel: CancellationToken,
    ) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        loop {
            let candidate = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(processed = report.total(), "Ingestion cancelled");
                    return Err(Error::Cancelled);
                }
                next = candidates.recv() => match next {
                    Some(candidate) => candidate,
                    None => break,
                },
            };

            let outcome = self.ingest(candidate).inspect_err(|e| {
                tracing::error!(error = %e, processed = report.total(), "Ingestion aborted");
            })?;
            report.record(outcome);
        }

        tracing::info!(
            inserted = report.inserted,
            already_exists = report.already_exists,
            rejected = report.rejected,
            "Ingestion finished"
        );
        Ok(report)
    }
}
