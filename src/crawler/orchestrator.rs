//! Crawl orchestrator
//!
//! Every start URL of every adapter becomes one task. Tasks of the same
//! adapter contend on that adapter's semaphore and rate limiter, tasks of
//! different adapters run independently. Extracted candidates are merged into
//! one bounded mpsc channel; the consumer sees them in completion order.
//!
//! ```text
//!  adapter A ──┬── url 1 ──┐
//!              └── url 2 ──┤
//!  adapter B ───── url 3 ──┼──▶ mpsc<ListingCandidate> ──▶ ingest
//!  adapter C ───── url 4 ──┘
//! ```

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::crawler::fetcher::Fetch;
use crate::crawler::source::SourceAdapter;
use crate::metrics;
use crate::models::ListingCandidate;
use crate::parser::parse_listings_blocking;

/// Per-cycle crawl statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Start URLs fetched with a 2xx response
    pub pages_fetched: u64,

    /// Start URLs skipped because the fetch failed
    pub pages_failed: u64,

    /// Candidates handed to the stream
    pub candidates: u64,

    /// Whether the crawl was cut short by cancellation
    pub cancelled: bool,
}

impl CrawlReport {
    fn merge(&mut self, page: PageOutcome) {
        match page {
            PageOutcome::Fetched { emitted } => {
                self.pages_fetched += 1;
                self.candidates += emitted;
            }
            PageOutcome::Failed => self.pages_failed += 1,
            PageOutcome::Cancelled { emitted } => {
                self.candidates += emitted;
                self.cancelled = true;
            }
        }
    }
}

/// Result of crawling one start URL
#[derive(Debug, Clone, Copy)]
enum PageOutcome {
    Fetched { emitted: u64 },
    Failed,
    Cancelled { emitted: u64 },
}

/// Drives source adapters and streams their candidates
pub struct CrawlOrchestrator {
    fetcher: Arc<dyn Fetch>,
    buffer_size: usize,
}

impl CrawlOrchestrator {
    /// Create an orchestrator on the given fetch capability
    pub fn new(fetcher: Arc<dyn Fetch>, buffer_size: usize) -> Self {
        Self {
            fetcher,
            buffer_size: buffer_size.max(1),
        }
    }

    /// Start crawling every start URL of every adapter
    ///
    /// Returns the merged candidate stream and a handle resolving to the
    /// cycle's report once every page task finished. The stream closes when
    /// the crawl is complete or cancelled. After cancellation no further
    /// candidate is sent.
    pub fn run(
        &self,
        sources: Vec<Arc<SourceAdapter>>,
        cancel: CancellationToken,
    ) -> (mpsc::Receiver<ListingCandidate>, JoinHandle<CrawlReport>) {
        let (tx, rx) = mpsc::channel(self.buffer_size);

        let mut tasks = JoinSet::new();
        for adapter in sources {
            for url in adapter.start_urls().to_vec() {
                tasks.spawn(crawl_page(
                    Arc::clone(&self.fetcher),
                    Arc::clone(&adapter),
                    url,
                    tx.clone(),
                    cancel.clone(),
                ));
            }
        }
        // The stream closes once the last page task drops its sender
        drop(tx);

        let handle = tokio::spawn(async move {
            let mut report = CrawlReport::default();
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(page) => report.merge(page),
                    Err(e) => {
                        tracing::error!(error = %e, "Crawl task panicked");
                        report.pages_failed += 1;
                    }
                }
            }

            tracing::info!(
                pages_fetched = report.pages_fetched,
                pages_failed = report.pages_failed,
                candidates = report.candidates,
                cancelled = report.cancelled,
                "Crawl finished"
            );
            report
        });

        (rx, handle)
    }
}

/// Fetch one start URL, extract it and forward its candidates
async fn crawl_page(
    fetcher: Arc<dyn Fetch>,
    adapter: Arc<SourceAdapter>,
    url: String,
    tx: mpsc::Sender<ListingCandidate>,
    cancel: CancellationToken,
) -> PageOutcome {
    let kind = adapter.kind();

    let fetched = tokio::select! {
        biased;
        _ = cancel.cancelled() => return PageOutcome::Cancelled { emitted: 0 },
        fetched = adapter.fetch(fetcher.as_ref(), &url) => fetched,
    };

    let body = match fetched {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(source = %kind, url = %url, error = %e, "Fetch failed, skipping page");
            metrics::record_page(kind.as_str(), false);
            return PageOutcome::Failed;
        }
    };
    metrics::record_page(kind.as_str(), true);

    let candidates = match parse_listings_blocking(kind, body).await {
        Ok(candidates) => candidates,
        Err(e) => {
            tracing::error!(source = %kind, url = %url, error = %e, "Extraction task failed");
            return PageOutcome::Failed;
        }
    };
    tracing::debug!(source = %kind, url = %url, count = candidates.len(), "Extracted candidates");
    metrics::record_candidates(kind.as_str(), candidates.len());

    let mut emitted = 0;
    for candidate in candidates {
        if cancel.is_cancelled() {
            return PageOutcome::Cancelled { emitted };
        }
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return PageOutcome::Cancelled { emitted },
            sent = tx.send(candidate) => sent,
        };
        if sent.is_err() {
            // consumer went away; nothing left to deliver to
            tracing::debug!(source = %kind, url = %url, "Candidate stream closed");
            break;
        }
        emitted += 1;
    }

    PageOutcome::Fetched { emitted }
}
