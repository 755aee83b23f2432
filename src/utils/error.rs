//! Error types for the fbmedia scraper
//!
//! This module defines the domain errors raised by the fetching, DOM,
//! parsing and pagination layers.

use thiserror::Error;

/// Errors that can occur during HTTP fetching operations
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Still rate limited (429) after the last retry
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Server error with status code
    #[error("Server error: {0}")]
    ServerError(u16),

    /// Last attempt timed out
    #[error("Request timeout")]
    Timeout,

    /// Maximum retry attempts exceeded
    #[error("Maximum retry attempts exceeded")]
    MaxRetriesExceeded,

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Errors raised by a DOM backend
///
/// Lookups that simply find nothing are not errors; these cover failures of
/// the backend itself (a dead browser tab, a rejected script).
#[derive(Error, Debug)]
pub enum DomError {
    /// The live page rejected a protocol command
    #[error("Browser command failed: {0}")]
    Browser(String),

    /// The page could not be navigated
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// Operation requires an interactive page
    #[error("Operation requires a live page")]
    NotInteractive,
}

/// Errors that can occur during parsing operations
#[derive(Error, Debug)]
pub enum ParseError {
    /// Required identifier missing from a matched URL
    #[error("Missing route parameter: {0}")]
    MissingParam(&'static str),
}

/// Errors from the infinite-scroll paginator
#[derive(Error, Debug)]
pub enum PaginationError {
    /// No element encloses the matching links
    #[error("No scroll container found for selector {selector}")]
    ContainerNotFound { selector: String },

    /// Scrolling the page failed
    #[error("Scroll failed: {0}")]
    Scroll(#[from] DomError),

    /// Discovered links could not be enqueued
    #[error("Failed to enqueue {count} links: {reason}")]
    Enqueue { count: usize, reason: String },
}

/// General crawler errors
#[derive(Error, Debug)]
pub enum CrawlerError {
    /// Fetch error
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// DOM backend error
    #[error("DOM error: {0}")]
    Dom(#[from] DomError),

    /// Pagination error
    #[error("Pagination error: {0}")]
    Pagination(#[from] PaginationError),

    /// Dataset sink rejected a record
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Request queue rejected new requests
    #[error("Queue error: {0}")]
    Queue(String),
}
