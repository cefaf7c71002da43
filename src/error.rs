//! Unified error handling for the immowatch crate
//!
//! Domain errors live in [`crate::utils::error`]; this module wraps them in a
//! single [`Error`] enum and classifies them so cycle runners can decide
//! whether a failure is local to one item or aborts the current cycle.
//!
//! - [`ImmowatchErrorTrait`] - common interface implemented by all error types
//! - [`ErrorCategory`] - classification of errors for handling strategies
//! - [`Error`] - unified error enum wrapping all domain-specific errors

use std::io;
use thiserror::Error;

pub use crate::utils::error::{FetchError, NotifyError, ParseError, StoreError};

/// Common trait for all immowatch error types
pub trait ImmowatchErrorTrait: std::error::Error {
    /// Check if this error is recoverable (the next cycle may succeed)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout, non-2xx)
    Network,
    /// Markup extraction errors
    Parsing,
    /// Listing store errors
    Storage,
    /// Notification delivery errors
    Notification,
    /// Configuration and validation errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Parsing => "parsing",
            Self::Storage => "storage",
            Self::Notification => "notification",
            Self::Config => "config",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ImmowatchErrorTrait for FetchError {
    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidHeader(_))
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidHeader(_) => ErrorCategory::Config,
            _ => ErrorCategory::Network,
        }
    }
}

impl ImmowatchErrorTrait for ParseError {
    // A malformed listing card is skipped; the rest of the page still counts
    fn is_recoverable(&self) -> bool {
        true
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Parsing
    }
}

impl ImmowatchErrorTrait for StoreError {
    fn is_recoverable(&self) -> bool {
        // A busy or unreachable database may come back by the next cycle
        matches!(self, Self::Sqlite(_) | Self::Io(_))
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Storage
    }
}

impl ImmowatchErrorTrait for NotifyError {
    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidConfig(_))
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidConfig(_) => ErrorCategory::Config,
            _ => ErrorCategory::Notification,
        }
    }
}

/// Unified error type for the immowatch crate
#[derive(Error, Debug)]
pub enum Error {
    /// Fetch-specific errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Parse-specific errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Listing store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Notification errors
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// The cycle was cancelled before completion
    #[error("Cycle cancelled")]
    Cancelled,

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ImmowatchErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Parse(e) => e.is_recoverable(),
            Self::Store(e) => e.is_recoverable(),
            Self::Notify(e) => e.is_recoverable(),
            Self::Io(_) => true,
            Self::Config(_) => false,
            Self::Cancelled => false,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(e) => e.category(),
            Self::Parse(_) => ErrorCategory::Parsing,
            Self::Store(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Notify(e) => e.category(),
            Self::Config(_) => ErrorCategory::Config,
            Self::Cancelled | Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(StoreError::Sqlite(err))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: err.to_string(),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
