//! Common test utilities

#![allow(dead_code)]

use std::cell::Cell;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use fbmedia::config::ScrollConfig;
use fbmedia::crawler::queue::RequestQueue;
use fbmedia::dom::{DomNode, NodeBox, NodeKey, PageSession};
use fbmedia::error::DomError;
use fbmedia::models::CrawlRequest;
use fbmedia::utils::error::CrawlerError;

/// Scroll tuning that never sleeps
pub fn fast_scroll(max_idle_ticks: u32) -> ScrollConfig {
    ScrollConfig {
        settle_idle_ms: 0,
        settle_timeout_ms: 0,
        tick_delay_ms: 0,
        max_idle_ticks,
    }
}

/// Live-like list page that reveals `batch` more items per scroll
///
/// Node 0 is the document, node 1 the list container, nodes 2.. the items.
/// Item nodes keep their identity across scrolls.
pub struct ScrollingPage {
    url: String,
    items: Vec<String>,
    batch: usize,
    revealed: Cell<usize>,
    scrolls: Cell<u32>,
}

impl ScrollingPage {
    pub fn new(total: usize, initial: usize, batch: usize) -> Self {
        Self {
            url: "https://www.facebook.com/groups/9/media/photos".into(),
            items: (1..=total)
                .map(|i| format!("/photo/?fbid={i}&set=g.9"))
                .collect(),
            batch,
            revealed: Cell::new(initial.min(total)),
            scrolls: Cell::new(0),
        }
    }

    pub fn scrolls(&self) -> u32 {
        self.scrolls.get()
    }

    fn node(&self, id: usize) -> NodeBox<'_> {
        Box::new(MockNode { page: self, id })
    }

    fn items(&self) -> Vec<NodeBox<'_>> {
        (0..self.revealed.get()).map(|i| self.node(i + 2)).collect()
    }
}

struct MockNode<'d> {
    page: &'d ScrollingPage,
    id: usize,
}

#[async_trait(?Send)]
impl<'d> DomNode<'d> for MockNode<'d> {
    fn key(&self) -> NodeKey {
        NodeKey(self.id as u64)
    }

    fn clone_node(&self) -> NodeBox<'d> {
        self.page.node(self.id)
    }

    async fn find_one(&self, selector: &str) -> Option<NodeBox<'d>> {
        self.find_many(selector).await.into_iter().next()
    }

    async fn find_many(&self, _selector: &str) -> Vec<NodeBox<'d>> {
        if self.id < 2 {
            self.page.items()
        } else {
            Vec::new()
        }
    }

    async fn children(&self) -> Vec<NodeBox<'d>> {
        match self.id {
            0 => vec![self.page.node(1)],
            1 => self.page.items(),
            _ => Vec::new(),
        }
    }

    async fn parent(&self) -> Option<NodeBox<'d>> {
        match self.id {
            0 => None,
            1 => Some(self.page.node(0)),
            _ => Some(self.page.node(1)),
        }
    }

    async fn closest(&self, _selector: &str) -> Option<NodeBox<'d>> {
        None
    }

    async fn attr(&self, name: &str) -> Option<String> {
        match (name, self.id) {
            ("href", id) if id >= 2 => self.page.items.get(id - 2).cloned(),
            _ => None,
        }
    }

    async fn prop(&self, name: &str) -> Option<Value> {
        self.attr(name).await.map(Value::from)
    }

    async fn text(&self) -> Option<String> {
        Some(format!("item {}", self.id))
    }

    async fn click(&self) -> Result<bool, DomError> {
        Ok(false)
    }
}

#[async_trait(?Send)]
impl PageSession for ScrollingPage {
    fn url(&self) -> &str {
        &self.url
    }

    fn is_interactive(&self) -> bool {
        true
    }

    async fn markup(&self) -> Result<String, DomError> {
        Err(DomError::NotInteractive)
    }

    async fn root(&self) -> Option<NodeBox<'_>> {
        Some(self.node(0))
    }

    async fn scroll(&self) -> Result<(), DomError> {
        self.scrolls.set(self.scrolls.get() + 1);
        let next = (self.revealed.get() + self.batch).min(self.items.len());
        self.revealed.set(next);
        Ok(())
    }

    async fn settle(&self, _idle: Duration, _timeout: Duration) {}
}

/// Queue that records every offered URL without deduplicating
///
/// With `fail_on_call` set, that call (1-based) is rejected.
#[derive(Default)]
pub struct RecordingQueue {
    offered: Mutex<Vec<String>>,
    calls: Mutex<usize>,
    fail_on_call: Option<usize>,
}

impl RecordingQueue {
    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Default::default()
        }
    }

    pub fn offered(&self) -> Vec<String> {
        self.offered.lock().unwrap().clone()
    }
}

#[async_trait]
impl RequestQueue for RecordingQueue {
    async fn add_requests(&self, requests: Vec<CrawlRequest>) -> Result<usize, CrawlerError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        if self.fail_on_call == Some(call) {
            return Err(CrawlerError::Queue("queue closed".into()));
        }
        let count = requests.len();
        self.offered
            .lock()
            .unwrap()
            .extend(requests.into_iter().map(|r| r.url));
        Ok(count)
    }

    async fn fetch_next(&self) -> Option<CrawlRequest> {
        None
    }

    async fn pending(&self) -> usize {
        0
    }
}
