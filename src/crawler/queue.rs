//! Request queue
//!
//! Handlers and the paginator enqueue every link they discover, duplicates
//! included. Deduplication by URL is the queue's job.

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::CrawlRequest;
use crate::utils::error::CrawlerError;

/// Destination for discovered URLs
#[async_trait]
pub trait RequestQueue: Send + Sync {
    /// Add requests, returning how many were new
    async fn add_requests(&self, requests: Vec<CrawlRequest>) -> Result<usize, CrawlerError>;

    /// Take the next pending request
    async fn fetch_next(&self) -> Option<CrawlRequest>;

    /// Number of requests still pending
    async fn pending(&self) -> usize;
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<CrawlRequest>,
    seen: HashSet<String>,
    order: Vec<String>,
}

/// In-process FIFO queue that drops URLs it has already seen
#[derive(Default)]
pub struct MemoryQueue {
    state: Mutex<QueueState>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every distinct URL ever accepted, in arrival order
    pub async fn seen_urls(&self) -> Vec<String> {
        self.state.lock().await.order.clone()
    }
}

#[async_trait]
impl RequestQueue for MemoryQueue {
    async fn add_requests(&self, requests: Vec<CrawlRequest>) -> Result<usize, CrawlerError> {
        let mut state = self.state.lock().await;
        let offered = requests.len();
        let mut added = 0;
        for request in requests {
            if state.seen.insert(request.url.clone()) {
                state.order.push(request.url.clone());
                state.pending.push_back(request);
                added += 1;
            }
        }
        debug!(offered, added, "Requests enqueued");
        Ok(added)
    }

    async fn fetch_next(&self) -> Option<CrawlRequest> {
        self.state.lock().await.pending.pop_front()
    }

    async fn pending(&self) -> usize {
        self.state.lock().await.pending.len()
    }
}
