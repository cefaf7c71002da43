//! Crawling: fetch capability, per-source adapters and the orchestrator
//!
//! Politeness (request delay, concurrency cap) lives on each
//! [`SourceAdapter`]; the [`CrawlOrchestrator`] only fans out over adapters
//! and merges their candidates into one stream.

pub mod fetcher;
pub mod orchestrator;
pub mod source;

pub use fetcher::{fetch_page, Fetch, FetchRequest, FetchResponse, HttpFetcher};
pub use orchestrator::{CrawlOrchestrator, CrawlReport};
pub use source::SourceAdapter;
