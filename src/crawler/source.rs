//! Source adapters: one extractor plus its crawl policy
//!
//! Politeness is enforced per adapter rather than globally because every
//! source tolerates a different request rate. Each adapter owns a rate
//! limiter spacing its requests by the configured delay and a semaphore
//! capping its in-flight requests.

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::SourceConfig;
use crate::crawler::fetcher::{should_retry, Fetch, FetchRequest, FetchResponse};
use crate::models::SourceKind;
use crate::utils::error::FetchError;
use crate::utils::retry::{with_retry_if, RetryConfig};

/// Extractor paired with its start URLs and crawl policy
pub struct SourceAdapter {
    /// Which extractor handles pages from this source
    kind: SourceKind,

    /// Result pages fetched once per cycle
    start_urls: Vec<String>,

    /// Spaces consecutive requests by the politeness delay (`None` when the delay is zero)
    rate_limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,

    /// Caps simultaneous requests against this source
    semaphore: Semaphore,

    /// Cookies sent with every request
    cookies: HashMap<String, String>,

    /// Extra headers sent with every request
    headers: HashMap<String, String>,

    /// Bounded retry policy layered on the fetch capability
    retry: RetryConfig,
}

impl SourceAdapter {
    /// Create an adapter with the given policy
    pub fn new(
        kind: SourceKind,
        start_urls: Vec<String>,
        concurrency_cap: usize,
        request_delay: Duration,
    ) -> Self {
        let rate_limiter = Quota::with_period(request_delay).map(RateLimiter::direct);

        Self {
            kind,
            start_urls,
            rate_limiter,
            semaphore: Semaphore::new(concurrency_cap.max(1)),
            cookies: HashMap::new(),
            headers: HashMap::new(),
            retry: RetryConfig::none(),
        }
    }

    /// Create an adapter from its configuration entry
    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(
            config.kind,
            config.start_urls.clone(),
            config.concurrency_cap,
            config.request_delay(),
        )
        .with_cookies(config.cookies.clone())
        .with_headers(config.headers.clone())
        .with_retry(RetryConfig::new(config.max_retries))
    }

    /// Set cookies sent with every request
    pub fn with_cookies(mut self, cookies: HashMap<String, String>) -> Self {
        self.cookies = cookies;
        self
    }

    /// Set extra headers sent with every request
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Layer a bounded retry policy on top of every fetch
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Source handled by this adapter
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Start URLs crawled once per cycle
    pub fn start_urls(&self) -> &[String] {
        &self.start_urls
    }

    /// Build the request for `url` with this source's cookies and headers
    pub fn request(&self, url: &str) -> FetchRequest {
        FetchRequest::get(url)
            .with_headers(self.headers.clone())
            .with_cookies(self.cookies.clone())
    }

    /// Fetch one page under this source's politeness policy
    pub async fn fetch(&self, fetcher: &dyn Fetch, url: &str) -> Result<String, FetchError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| FetchError::Cancelled)?;

        let request = self.request(url);

        // every attempt, retries included, passes the politeness gate
        with_retry_if(
            &self.retry,
            || async {
                if let Some(limiter) = &self.rate_limiter {
                    limiter.until_ready().await;
                }
                fetcher
                    .fetch(&request)
                    .await
                    .and_then(FetchResponse::into_success_body)
            },
            should_retry,
        )
        .await
    }
}
