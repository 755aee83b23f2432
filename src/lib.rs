//! fbmedia - Facebook group media scraper
//!
//! Walks a group's media tabs, albums, photo pages and video pages and turns
//! each media page into one flat JSON record (images, video sources, author,
//! engagement counts).
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`router`] - Classifies URLs into page kinds
//! - [`handlers`] - One handler per page kind
//! - [`pipeline`] - Multi-source field resolution (payload, live page, markup)
//! - [`crawler`] - Runner, infinite-scroll paginator, fetchers, queue and dataset
//! - [`dom`] - DOM queries over parsed markup or a live Chrome tab
//! - [`parser`] - Timestamps, counts, embedded payload search, selectors
//! - [`privacy`] - Redaction of identity fields
//! - [`config`] - Configuration management and settings
//! - [`models`] - Output records
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fbmedia::config::Config;
//! use fbmedia::crawler::dataset::JsonLinesDataset;
//! use fbmedia::crawler::queue::MemoryQueue;
//! use fbmedia::crawler::{Backend, Crawler};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let backend = Backend::from_config(&config).await?;
//!     let dataset = Arc::new(JsonLinesDataset::open("output/records.jsonl").await?);
//!     let crawler = Crawler::new(config, backend, Arc::new(MemoryQueue::new()), dataset)?;
//!     let stats = crawler.run().await?;
//!     println!("{} records", stats.records_written);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawler;
pub mod dom;
pub mod error;
pub mod handlers;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod privacy;
pub mod router;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::{Backend, Crawler};
    pub use crate::dom::{DomNode, PageSession, StaticPage};
    pub use crate::error::{Error, ErrorCategory, FbMediaErrorTrait, Result};
    pub use crate::models::{AlbumRecord, CrawlStats, EntityRecord, PhotoRecord, VideoRecord};
    pub use crate::router::{match_url, Route, RouteMatch};
}

// Direct re-exports for convenience
pub use models::{CrawlStats, EntityRecord};
