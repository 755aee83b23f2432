//! Crawl runner
//!
//! Drains the request queue in waves of up to `max_concurrency` page visits.
//! Each visit routes its URL, opens a page through the configured backend and
//! runs the matching handler. Failed visits are retried as a whole when the
//! error is recoverable.

pub mod dataset;
pub mod fetcher;
pub mod paginator;
pub mod queue;

use std::cell::RefCell;
use std::sync::Arc;

use anyhow::Context;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, instrument};

use crate::config::Config;
use crate::dom::{PageSession, StaticPage};
use crate::error::{Error, FbMediaErrorTrait, Result};
use crate::handlers::{dispatch, Handled, HandlerContext};
use crate::models::{CrawlRequest, CrawlStats};
use crate::privacy::PrivacyMask;
use crate::router::{match_url, RouteMatch};
use crate::utils::retry::{with_retry_if, RetryConfig};

use dataset::DatasetSink;
use fetcher::{ImageMetaFetcher, PageFetcher};
use queue::RequestQueue;

#[cfg(feature = "browser")]
use crate::dom::live::LiveBrowser;

/// Where page sessions come from
pub enum Backend {
    /// Plain HTTP fetch, parsed once
    Static(PageFetcher),
    /// Chrome tab per visit
    #[cfg(feature = "browser")]
    Live(LiveBrowser),
}

impl Backend {
    /// Backend selected by `crawler.use_browser`
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        if config.crawler.use_browser {
            #[cfg(feature = "browser")]
            {
                let browser = LiveBrowser::launch(&config.browser)
                    .await
                    .context("Failed to launch browser")?;
                return Ok(Self::Live(browser));
            }
            #[cfg(not(feature = "browser"))]
            anyhow::bail!("use_browser requires building with the `browser` feature");
        }

        let fetcher = PageFetcher::with_config(
            config.crawler.rate_limit,
            config.crawler.max_request_retries,
            config.request_timeout(),
        )
        .context("Failed to create page fetcher")?;
        Ok(Self::Static(fetcher))
    }

    /// Open `url` as a page session
    pub async fn open(&self, url: &str) -> Result<Box<dyn PageSession>> {
        match self {
            Self::Static(fetcher) => {
                let markup = fetcher.fetch_page(url).await?;
                Ok(Box::new(StaticPage::new(url, markup)))
            }
            #[cfg(feature = "browser")]
            Self::Live(browser) => Ok(Box::new(browser.open(url).await?)),
        }
    }
}

enum Visit {
    Skipped,
    Done(Handled),
    Failed,
}

/// Queue-driven crawler
pub struct Crawler {
    config: Config,
    backend: Backend,
    queue: Arc<dyn RequestQueue>,
    dataset: Arc<dyn DatasetSink>,
    mask: PrivacyMask,
    images: Option<ImageMetaFetcher>,
    retry: RetryConfig,
}

impl Crawler {
    /// Create a crawler over the given backend, queue and dataset
    pub fn new(
        config: Config,
        backend: Backend,
        queue: Arc<dyn RequestQueue>,
        dataset: Arc<dyn DatasetSink>,
    ) -> anyhow::Result<Self> {
        config.validate().context("Invalid configuration")?;

        let images = if config.crawler.enrich_images {
            let fetcher = ImageMetaFetcher::new(config.request_timeout())
                .context("Failed to create image fetcher")?;
            Some(fetcher)
        } else {
            None
        };

        Ok(Self {
            mask: PrivacyMask::new(config.privacy.clone()),
            retry: RetryConfig::new(config.crawler.max_request_retries),
            config,
            backend,
            queue,
            dataset,
            images,
        })
    }

    /// Override the backoff between visit retries
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Seed the queue with the start URLs and crawl until it is empty
    pub async fn run(&self) -> Result<CrawlStats> {
        let seeds: Vec<CrawlRequest> = self
            .config
            .crawler
            .start_urls
            .iter()
            .map(CrawlRequest::new)
            .collect();
        self.queue.add_requests(seeds).await?;

        let concurrency = self.config.crawler.max_concurrency.max(1);
        let stats = RefCell::new(CrawlStats::default());

        loop {
            let mut wave = Vec::with_capacity(concurrency);
            while wave.len() < concurrency {
                match self.queue.fetch_next().await {
                    Some(request) => wave.push(request),
                    None => break,
                }
            }
            if wave.is_empty() {
                break;
            }
            debug!(size = wave.len(), "Starting wave");

            stream::iter(wave)
                .for_each_concurrent(concurrency, |request| {
                    let stats = &stats;
                    async move {
                        let visit = self.visit(request).await;
                        let mut stats = stats.borrow_mut();
                        match visit {
                            Visit::Skipped => stats.pages_skipped += 1,
                            Visit::Done(handled) => {
                                stats.pages_visited += 1;
                                stats.records_written += handled.records as u64;
                                stats.links_enqueued += handled.enqueued as u64;
                            }
                            Visit::Failed => {
                                stats.pages_visited += 1;
                                stats.pages_failed += 1;
                            }
                        }
                    }
                })
                .await;
        }

        let stats = stats.into_inner();
        info!(
            visited = stats.pages_visited,
            failed = stats.pages_failed,
            skipped = stats.pages_skipped,
            records = stats.records_written,
            success_rate = stats.success_rate(),
            "Crawl finished"
        );
        Ok(stats)
    }

    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn visit(&self, request: CrawlRequest) -> Visit {
        let Some(route) = match_url(&request.url) else {
            debug!("Unhandled URL skipped");
            return Visit::Skipped;
        };
        let route = &route;

        let result = with_retry_if(
            &self.retry,
            move |attempt| self.visit_once(route, attempt),
            |e: &Error| e.is_recoverable(),
        )
        .await;

        match result {
            Ok(handled) => Visit::Done(handled),
            Err(e) => {
                error!(
                    route = %route.route,
                    category = e.category().as_str(),
                    error = %e,
                    "Page visit failed"
                );
                Visit::Failed
            }
        }
    }

    async fn visit_once(&self, route: &RouteMatch, attempt: u32) -> Result<Handled> {
        debug!(route = %route.route, attempt, "Visiting page");
        let page = self.backend.open(&route.url).await?;
        let ctx = HandlerContext {
            page: page.as_ref(),
            route,
            queue: self.queue.as_ref(),
            dataset: self.dataset.as_ref(),
            mask: &self.mask,
            images: self.images.as_ref(),
            scroll: &self.config.scroll,
            max_items: self.config.crawler.output_max_entries,
        };
        dispatch(&ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataset::MemoryDataset;
    use queue::MemoryQueue;

    fn crawler(config: Config) -> anyhow::Result<Crawler> {
        let backend = Backend::Static(PageFetcher::new(10).unwrap());
        Crawler::new(
            config,
            backend,
            Arc::new(MemoryQueue::new()),
            Arc::new(MemoryDataset::new()),
        )
    }

    #[test]
    fn test_crawler_creation() {
        assert!(crawler(Config::default()).is_ok());
    }

    #[test]
    fn test_invalid_config_fails() {
        let mut config = Config::default();
        config.crawler.max_concurrency = 0;
        assert!(crawler(config).is_err());
    }

    #[tokio::test]
    async fn test_unrouted_start_urls_are_skipped() {
        let mut config = Config::default();
        config.crawler.start_urls = vec![
            "https://www.facebook.com/marketplace/".into(),
            "https://www.facebook.com/events/1".into(),
        ];
        let stats = crawler(config).unwrap().run().await.unwrap();

        assert_eq!(stats.pages_skipped, 2);
        assert_eq!(stats.pages_visited, 0);
    }

    #[cfg(not(feature = "browser"))]
    #[tokio::test]
    async fn test_browser_backend_requires_feature() {
        let mut config = Config::default();
        config.crawler.use_browser = true;
        assert!(Backend::from_config(&config).await.is_err());
    }
}
