//! immowatch - rental listing watcher
//!
//! Crawls listing-index pages of several real-estate sites, stores every new
//! listing exactly once, pushes a notification for it and periodically
//! revalidates stored listings to purge offers that are gone.
//!
//! # Architecture
//!
//! - [`parser`] - per-source extraction and removal detection
//! - [`crawler`] - fetch capability, source adapters, crawl orchestrator
//! - [`ingest`] - deduplicating store-and-notify pipeline
//! - [`sweeper`] - availability revalidation
//! - [`storage`] - listing store (SQLite, in-memory)
//! - [`notifications`] - ntfy / webhook notifiers and dispatch
//! - [`cycle`] - crawl and sweep entry points
//! - [`config`], [`error`], [`metrics`], [`utils`] - supporting modules
//!
//! # Example
//!
//! ```no_run
//! use immowatch::config::Config;
//! use immowatch::cycle::{run_crawl_cycle, CycleContext};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ctx = CycleContext::from_config(Config::from_env()?)?;
//!     let report = run_crawl_cycle(&ctx, CancellationToken::new()).await?;
//!     println!("{} new listings", report.ingest.inserted);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawler;
pub mod cycle;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod notifications;
pub mod parser;
pub mod storage;
pub mod sweeper;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, SourceConfig};
    pub use crate::crawler::{CrawlOrchestrator, CrawlReport, Fetch, HttpFetcher, SourceAdapter};
    pub use crate::cycle::{run_availability_sweep, run_crawl_cycle, CycleContext};
    pub use crate::error::{Error, ErrorCategory, ImmowatchErrorTrait, Result};
    pub use crate::ingest::{IngestOutcome, IngestReport, IngestionPipeline};
    pub use crate::models::{Listing, ListingCandidate, SourceKind};
    pub use crate::notifications::{Notifier, NtfyNotifier, WebhookNotifier};
    pub use crate::storage::{ListingStore, MemoryListingStore, SqliteListingStore};
    pub use crate::sweeper::{AvailabilitySweeper, SweepReport};
}

pub use models::{Listing, ListingCandidate, SourceKind};
