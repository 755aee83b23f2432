//! Infinite-scroll pagination
//!
//! A list page only renders a window of its items; more appear as the page
//! is scrolled. The paginator locates the element enclosing the item links
//! once, then repeatedly diffs its matching descendants against the ones
//! already seen and enqueues only the new links. A tile often carries several
//! anchors to the same item, so links are also deduplicated by URL and the
//! running total counts items rather than anchors. Each batch goes to the queue
//! as soon as it is found, so a failure late in a long list keeps everything
//! discovered before it.

use std::collections::HashSet;

use tracing::{debug, info, trace};

use super::queue::RequestQueue;
use crate::config::ScrollConfig;
use crate::dom::{link_of, NodeKey, PageSession};
use crate::models::CrawlRequest;
use crate::utils::absolutize;
use crate::utils::error::PaginationError;

/// Decides from the running total whether to stop
pub type StopPredicate = Box<dyn Fn(usize) -> bool + Send + Sync>;

/// How a pagination run ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationOutcome {
    /// Distinct item links enqueued over the whole run
    pub total: usize,
    /// Scroll ticks performed
    pub ticks: u32,
    /// The list stopped growing before the stop predicate fired
    pub exhausted: bool,
}

/// Scrolls a list page and enqueues newly revealed item links
pub struct ScrollPaginator {
    link_selector: String,
    scroll: ScrollConfig,
    stop: Option<StopPredicate>,
}

impl ScrollPaginator {
    pub fn new(link_selector: impl Into<String>, scroll: &ScrollConfig) -> Self {
        Self {
            link_selector: link_selector.into(),
            scroll: scroll.clone(),
            stop: None,
        }
    }

    /// Stop once strictly more than `max` links were enqueued
    #[must_use]
    pub fn with_max_items(self, max: Option<usize>) -> Self {
        match max {
            Some(max) => self.with_stop(move |total| total > max),
            None => self,
        }
    }

    /// Replace the stop predicate
    #[must_use]
    pub fn with_stop(mut self, stop: impl Fn(usize) -> bool + Send + Sync + 'static) -> Self {
        self.stop = Some(Box::new(stop));
        self
    }

    fn should_stop(&self, total: usize) -> bool {
        self.stop.as_ref().is_some_and(|stop| stop(total))
    }

    /// Run until the stop predicate fires or the list is exhausted
    ///
    /// # Errors
    ///
    /// Returns `PaginationError::ContainerNotFound` when no item links are
    /// visible on entry. Links enqueued before a later error stay enqueued.
    pub async fn run(
        &self,
        page: &dyn PageSession,
        queue: &dyn RequestQueue,
    ) -> Result<PaginationOutcome, PaginationError> {
        let not_found = || PaginationError::ContainerNotFound {
            selector: self.link_selector.clone(),
        };
        let root = page.root().await.ok_or_else(not_found)?;
        let container = root
            .common_ancestor_from_selector(&self.link_selector)
            .await
            .ok_or_else(not_found)?;

        let mut seen: HashSet<NodeKey> = HashSet::new();
        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut outcome = PaginationOutcome::default();
        let mut idle_ticks = 0;

        loop {
            let fresh = container.new_descendants(&self.link_selector, &mut seen).await;
            let mut batch = Vec::with_capacity(fresh.len());
            for node in &fresh {
                let Some(href) = link_of(node.as_ref()).await else {
                    continue;
                };
                if let Some(url) = absolutize(page.url(), &href) {
                    if seen_urls.insert(url.clone()) {
                        batch.push(CrawlRequest::new(url));
                    }
                }
            }

            if batch.is_empty() {
                idle_ticks += 1;
            } else {
                idle_ticks = 0;
                let count = batch.len();
                queue
                    .add_requests(batch)
                    .await
                    .map_err(|e| PaginationError::Enqueue {
                        count,
                        reason: e.to_string(),
                    })?;
                outcome.total += count;
                debug!(url = page.url(), batch = count, total = outcome.total, "Links enqueued");
            }

            if self.should_stop(outcome.total) {
                break;
            }
            if !page.is_interactive() || idle_ticks >= self.scroll.max_idle_ticks {
                outcome.exhausted = true;
                break;
            }

            page.scroll().await?;
            page.settle(self.scroll.settle_idle(), self.scroll.settle_timeout())
                .await;
            tokio::time::sleep(self.scroll.tick_delay()).await;
            outcome.ticks += 1;
            trace!(tick = outcome.ticks, idle_ticks, "Scroll tick");
        }

        page.settle(self.scroll.settle_idle(), self.scroll.settle_timeout())
            .await;
        info!(
            url = page.url(),
            total = outcome.total,
            ticks = outcome.ticks,
            exhausted = outcome.exhausted,
            "Pagination finished"
        );
        Ok(outcome)
    }
}
