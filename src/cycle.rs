//! Crawl and sweep cycles
//!
//! [`run_crawl_cycle`] and [`run_availability_sweep`] are the entry points an
//! external scheduler calls. Both share the collaborators held by a
//! [`CycleContext`]; apart from the listing store the two cycles have no
//! state in common and may overlap.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::crawler::{CrawlOrchestrator, CrawlReport, Fetch, HttpFetcher, SourceAdapter};
use crate::error::{Error, Result};
use crate::ingest::{IngestReport, IngestionPipeline};
use crate::metrics;
use crate::notifications::{notifier_from_config, DispatchStats, NotificationDispatcher, Notifier};
use crate::storage::{open_sqlite, ListingStore};
use crate::sweeper::{AvailabilitySweeper, SweepReport};

/// Collaborators shared by every cycle
pub struct CycleContext {
    config: Config,
    store: Arc<dyn ListingStore>,
    fetcher: Arc<dyn Fetch>,
    notifier: Arc<dyn Notifier>,
    /// Built once so overlapping crawls and sweeps share each source's limiter
    adapters: Vec<Arc<SourceAdapter>>,
}

impl CycleContext {
    pub fn new(
        config: Config,
        store: Arc<dyn ListingStore>,
        fetcher: Arc<dyn Fetch>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let adapters = config
            .sources
            .iter()
            .map(|source| Arc::new(SourceAdapter::from_config(source)))
            .collect();

        Self {
            config,
            store,
            fetcher,
            notifier,
            adapters,
        }
    }

    /// Wire up the production collaborators described by `config`
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, an unopenable database or an HTTP
    /// client that cannot be built.
    pub fn from_config(config: Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::config(format!("{e:#}")))?;

        let store = open_sqlite(&config.storage.sqlite_path)?;
        let fetcher: Arc<dyn Fetch> = Arc::new(HttpFetcher::new(
            &config.crawler.user_agent,
            config.request_timeout(),
        )?);
        let notifier = notifier_from_config(&config.notifications)?;

        Ok(Self::new(config, store, fetcher, notifier))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ListingStore> {
        &self.store
    }

    /// One adapter per configured source, shared by every cycle
    pub fn adapters(&self) -> Vec<Arc<SourceAdapter>> {
        self.adapters.clone()
    }
}

/// Outcome of one crawl cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlCycleReport {
    pub crawl: CrawlReport,
    pub ingest: IngestReport,
    pub notifications: DispatchStats,
}

/// Crawl every configured source once and ingest what was found
///
/// Queued notifications are delivered before this returns.
///
/// # Errors
///
/// `Error::Store` aborts the cycle (already stored listings stay stored);
/// `Error::Cancelled` when `cancel` fired.
pub async fn run_crawl_cycle(
    ctx: &CycleContext,
    cancel: CancellationToken,
) -> Result<CrawlCycleReport> {
    let _timer = metrics::start_cycle_timer("crawl");
    let config = &ctx.config;
    tracing::info!(sources = config.sources.len(), "Starting crawl cycle");

    let dispatcher = NotificationDispatcher::spawn(
        Arc::clone(&ctx.notifier),
        config.notifications.queue_size,
    );

    // child token so a failed ingest also stops the crawl side
    let crawl_cancel = cancel.child_token();
    let orchestrator =
        CrawlOrchestrator::new(Arc::clone(&ctx.fetcher), config.crawler.channel_buffer_size);
    let (candidates, crawl_task) = orchestrator.run(ctx.adapters(), crawl_cancel.clone());

    let ingested = {
        let pipeline = IngestionPipeline::new(
            Arc::clone(&ctx.store),
            dispatcher.handle(),
            config.notifications.topic.clone(),
        );
        pipeline.consume(candidates, cancel.clone()).await
    };
    if ingested.is_err() {
        crawl_cancel.cancel();
    }

    let crawl = crawl_task
        .await
        .map_err(|e| Error::with_source("Crawl task failed", e))?;
    let notifications = dispatcher.close().await;
    let ingest = ingested?;

    tracing::info!(
        pages_fetched = crawl.pages_fetched,
        pages_failed = crawl.pages_failed,
        inserted = ingest.inserted,
        already_exists = ingest.already_exists,
        rejected = ingest.rejected,
        notifications_sent = notifications.sent,
        notifications_failed = notifications.failed,
        "Crawl cycle finished"
    );

    Ok(CrawlCycleReport {
        crawl,
        ingest,
        notifications,
    })
}

/// Revalidate every stored listing once
pub async fn run_availability_sweep(
    ctx: &CycleContext,
    cancel: CancellationToken,
) -> Result<SweepReport> {
    let _timer = metrics::start_cycle_timer("sweep");

    AvailabilitySweeper::new(
        Arc::clone(&ctx.store),
        Arc::clone(&ctx.fetcher),
        ctx.config.crawler.sweep_concurrency,
    )
    .with_adapters(ctx.adapters())
    .sweep_with_report(cancel)
    .await
}
