//! Unified error handling for the fbmedia crate
//!
//! Domain errors live in [`crate::utils::error`]; this module folds them into a
//! single [`Error`] enum so handler and runner code can use one `Result` type
//! while still deciding per error whether a page visit is worth retrying.
//!
//! # Usage
//!
//! ```rust,ignore
//! use fbmedia::error::{Error, FbMediaErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         tracing::warn!(error = %err, "Retrying page visit");
//!     } else {
//!         tracing::error!(error = %err, "Giving up on page");
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

pub use crate::utils::error::{
    CrawlerError, DomError, FetchError, PaginationError, ParseError,
};

/// Common trait for all fbmedia error types
pub trait FbMediaErrorTrait: std::error::Error {
    /// Check if this error is recoverable (the page visit can be retried)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout, rate limit)
    Network,
    /// Parsing and data extraction errors
    Parsing,
    /// Browser and DOM backend errors
    Browser,
    /// Queue, dataset and I/O errors
    Storage,
    /// Configuration and validation errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Short human-readable label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Parsing => "parsing",
            Self::Browser => "browser",
            Self::Storage => "storage",
            Self::Config => "config",
            Self::Other => "other",
        }
    }
}

impl FbMediaErrorTrait for FetchError {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimit | Self::Timeout => true,
            Self::ServerError(status) => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::MaxRetriesExceeded | Self::InvalidUrl(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Network
    }
}

impl FbMediaErrorTrait for DomError {
    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::NotInteractive)
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Browser
    }
}

impl FbMediaErrorTrait for PaginationError {
    fn is_recoverable(&self) -> bool {
        match self {
            // Retried by re-visiting the whole page, never inside the paginator
            Self::ContainerNotFound { .. } => true,
            Self::Scroll(e) => e.is_recoverable(),
            Self::Enqueue { .. } => true,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::ContainerNotFound { .. } => ErrorCategory::Parsing,
            Self::Scroll(_) => ErrorCategory::Browser,
            Self::Enqueue { .. } => ErrorCategory::Storage,
        }
    }
}

impl FbMediaErrorTrait for CrawlerError {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Parse(_) => false,
            Self::Dom(e) => e.is_recoverable(),
            Self::Pagination(e) => e.is_recoverable(),
            Self::Dataset(_) | Self::Queue(_) => true,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(_) => ErrorCategory::Network,
            Self::Parse(_) => ErrorCategory::Parsing,
            Self::Dom(_) => ErrorCategory::Browser,
            Self::Pagination(e) => e.category(),
            Self::Dataset(_) | Self::Queue(_) => ErrorCategory::Storage,
        }
    }
}

/// Unified error type for the fbmedia crate
#[derive(Error, Debug)]
pub enum Error {
    /// Crawler-related errors (fetch, parse, paginate)
    #[error("Crawler error: {0}")]
    Crawler(#[from] CrawlerError),

    /// Fetch-specific errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Parse-specific errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// DOM backend errors
    #[error("DOM error: {0}")]
    Dom(#[from] DomError),

    /// Pagination errors
    #[error("Pagination error: {0}")]
    Pagination(#[from] PaginationError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl FbMediaErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Crawler(e) => e.is_recoverable(),
            Self::Fetch(e) => e.is_recoverable(),
            Self::Parse(_) => false,
            Self::Dom(e) => e.is_recoverable(),
            Self::Pagination(e) => e.is_recoverable(),
            Self::Io(_) => true,
            Self::Json(_) => false,
            Self::Http(_) => true,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Crawler(e) => e.category(),
            Self::Fetch(_) | Self::Http(_) => ErrorCategory::Network,
            Self::Parse(_) | Self::Json(_) => ErrorCategory::Parsing,
            Self::Dom(_) => ErrorCategory::Browser,
            Self::Pagination(e) => e.category(),
            Self::Io(_) => ErrorCategory::Storage,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
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
