//! HTTP fetch capability
//!
//! [`Fetch`] is the seam between the crawl/sweep logic and the network:
//! production code uses [`HttpFetcher`] on reqwest, tests substitute their
//! own implementations. Cookies and headers travel with each
//! [`FetchRequest`] instead of living in a shared client cookie jar, so every
//! source carries its own session state explicitly.

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, USER_AGENT},
    Client,
};
use std::collections::HashMap;
use std::time::Duration;

use crate::utils::error::FetchError;
use crate::utils::retry::{with_retry_if, RetryConfig};

/// One GET request with per-call headers and cookies
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
}

impl FetchRequest {
    /// Plain GET without extra headers or cookies
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Attach headers
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Attach cookies
    pub fn with_cookies(mut self, cookies: HashMap<String, String>) -> Self {
        self.cookies = cookies;
        self
    }
}

/// Status and decoded body of a completed request
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body of a 2xx response, `FetchError::Status` otherwise
    pub fn into_success_body(self) -> Result<String, FetchError> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(FetchError::Status(self.status))
        }
    }
}

/// Fetch capability consumed by the orchestrator and the sweeper
///
/// A non-2xx status is a successful fetch: the response is returned and the
/// caller decides what it means. Only transport-level failures are errors.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// Determine if a failure should trigger a retry
///
/// Retry on 429, 5xx gateway/availability codes, timeouts and transport
/// errors. Never retry on 4xx client errors or configuration problems.
pub fn should_retry(error: &FetchError) -> bool {
    match error {
        FetchError::Status(status) => matches!(status, 429 | 500 | 502 | 503 | 504),
        FetchError::Timeout | FetchError::Http(_) => true,
        _ => false,
    }
}

/// Fetch a page and return its body, treating non-2xx as an error
///
/// Retryable failures are retried according to `retry`; with
/// [`RetryConfig::none`] exactly one request is made.
pub async fn fetch_page(
    fetcher: &dyn Fetch,
    request: &FetchRequest,
    retry: &RetryConfig,
) -> Result<String, FetchError> {
    with_retry_if(
        retry,
        || async {
            fetcher
                .fetch(request)
                .await
                .and_then(FetchResponse::into_success_body)
        },
        should_retry,
    )
    .await
}

/// reqwest-backed fetcher
pub struct HttpFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,
}

impl HttpFetcher {
    /// Create a new fetcher
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        default_headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("de-DE,de;q=0.9,en-US;q=0.8,en;q=0.7"),
        );
        let user_agent = HeaderValue::from_str(user_agent)
            .map_err(|_| FetchError::InvalidHeader(format!("{USER_AGENT}: {user_agent}")))?;
        default_headers.insert(USER_AGENT, user_agent);

        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .default_headers(default_headers)
            .build()?;

        Ok(Self { client })
    }

    /// Build per-request headers, including the `Cookie` header
    fn build_headers(request: &FetchRequest) -> Result<HeaderMap, FetchError> {
        let mut headers = HeaderMap::new();

        for (name, value) in &request.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| FetchError::InvalidHeader(name.clone()))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| FetchError::InvalidHeader(format!("{name}: {value}")))?;
            headers.insert(header_name, header_value);
        }

        if !request.cookies.is_empty() {
            let mut pairs: Vec<String> = request
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            pairs.sort();

            let cookie = pairs.join("; ");
            let cookie_value = HeaderValue::from_str(&cookie)
                .map_err(|_| FetchError::InvalidHeader(format!("{COOKIE}: {cookie}")))?;
            headers.insert(COOKIE, cookie_value);
        }

        Ok(headers)
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let headers = Self::build_headers(request)?;

        tracing::debug!(url = %request.url, "Fetching URL");

        let response = self
            .client
            .get(&request.url)
            .headers(headers)
            .send()
            .await
            .map_err(FetchError::from_transport)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(FetchError::from_transport)?;

        Ok(FetchResponse { status, body })
    }
}
