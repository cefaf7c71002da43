//! Error types for the immowatch pipeline
//!
//! This module defines the domain error enums used by the fetcher, the
//! extractors, the listing store and the notifiers.

use thiserror::Error;

/// Errors that can occur during HTTP fetching operations
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status code
    #[error("Unexpected status: {0}")]
    Status(u16),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Invalid header name or value in the request configuration
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Crawl cycle was cancelled while the request was in flight
    #[error("Request cancelled")]
    Cancelled,
}

impl FetchError {
    /// Classify a reqwest error, separating timeouts from other transport failures
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}

/// Errors that can occur while extracting a single listing block
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The listing block has no link, so it has no dedup key
    #[error("Listing block has no link")]
    MissingLink,

    /// The link could not be resolved to an absolute URL
    #[error("Invalid listing URL: {0}")]
    InvalidUrl(String),
}

/// Errors raised by a listing store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying SQLite failure
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A lock guarding the connection was poisoned by a panicking writer
    #[error("Store lock poisoned")]
    Poisoned,

    /// Filesystem error while preparing the database location
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while delivering a notification
#[derive(Error, Debug)]
pub enum NotifyError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("Notification endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Invalid notifier configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Dispatch queue is full or closed
    #[error("Notification queue unavailable: {0}")]
    QueueUnavailable(String),
}
