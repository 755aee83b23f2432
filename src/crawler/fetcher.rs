//! HTTP fetching for static pages and image metadata
//!
//! - [`PageFetcher`] loads page markup for the static DOM backend with
//!   User-Agent rotation, rate limiting through governor, and retry with
//!   exponential backoff on 429/5xx.
//! - [`ImageMetaFetcher`] asks the CDN for an image's size and MIME type
//!   without downloading it.

use crate::models::ImageMeta;
use crate::utils::error::FetchError;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use rand::seq::SliceRandom;
use reqwest::{
    header::{
        HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_LENGTH, CONTENT_RANGE,
        CONTENT_TYPE, RANGE, USER_AGENT,
    },
    Client, Response, StatusCode,
};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Pool of realistic User-Agent strings for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
];

/// Get a random user agent from the pool
fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0])
}

/// Page fetcher for the static backend
pub struct PageFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Rate limiter to control request frequency
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    /// Maximum number of retry attempts for failed requests
    max_retries: u32,

    /// Base delay in milliseconds for exponential backoff
    base_delay_ms: u64,

    /// Optional origin override for testing with mock servers
    base_url: Option<String>,
}

impl PageFetcher {
    /// Create a new fetcher with default settings
    ///
    /// # Arguments
    ///
    /// * `requests_per_second` - Maximum number of requests per second
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new(requests_per_second: u32) -> Result<Self, FetchError> {
        Self::with_config(requests_per_second, 3, Duration::from_secs(30))
    }

    /// Create a new fetcher with custom configuration
    ///
    /// # Arguments
    ///
    /// * `requests_per_second` - Maximum number of requests per second
    /// * `max_retries` - Maximum number of retry attempts
    /// * `timeout` - Request timeout duration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn with_config(
        requests_per_second: u32,
        max_retries: u32,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .cookie_store(true)
            .build()?;

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
            max_retries,
            base_delay_ms: 1000,
            base_url: None,
        })
    }

    /// Send every request to `base_url` instead of the URL's own origin
    ///
    /// Path and query are kept. Used to point the fetcher at a mock server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    /// Override the first backoff delay
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay_ms = delay.as_millis() as u64;
        self
    }

    fn target_url(&self, url: &str) -> Result<String, FetchError> {
        let Some(base) = &self.base_url else {
            Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
            return Ok(url.to_string());
        };
        match Url::parse(url) {
            Ok(parsed) => {
                let query = parsed.query().map(|q| format!("?{q}")).unwrap_or_default();
                Ok(format!("{base}{}{query}", parsed.path()))
            }
            Err(_) if url.starts_with('/') => Ok(format!("{base}{url}")),
            Err(_) => Err(FetchError::InvalidUrl(url.to_string())),
        }
    }

    /// Fetch page markup with rate limiting and retries
    ///
    /// # Errors
    ///
    /// Returns `FetchError::ServerError` for non-retryable statuses. Once
    /// retries run out the last failure decides the error:
    /// `FetchError::RateLimit` after a 429, `FetchError::Timeout` after a
    /// timeout and `FetchError::MaxRetriesExceeded` otherwise.
    pub async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let target = self.target_url(url)?;
        self.rate_limiter.until_ready().await;
        self.fetch_with_retry(&target).await
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<String, FetchError> {
        let mut last = FetchError::MaxRetriesExceeded;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay_ms * 2_u64.pow(attempt - 1);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match self.client.get(url).headers(build_headers()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.text().await?);
                    } else if should_retry(status.as_u16()) {
                        debug!(url, status = status.as_u16(), attempt, "Retryable status");
                        last = if status.as_u16() == 429 {
                            FetchError::RateLimit
                        } else {
                            FetchError::MaxRetriesExceeded
                        };
                    } else {
                        return Err(FetchError::ServerError(status.as_u16()));
                    }
                }
                Err(e) if e.is_timeout() => {
                    debug!(url, attempt, "Request timed out");
                    last = FetchError::Timeout;
                }
                Err(e) => {
                    debug!(url, attempt, error = %e, "Request failed");
                    last = FetchError::MaxRetriesExceeded;
                }
            }
        }

        warn!(url, retries = self.max_retries, error = %last, "Giving up on page fetch");
        Err(last)
    }
}

/// Determine if a status code should trigger a retry
///
/// Retry on 429 and 500/502/503/504; everything else is final.
fn should_retry(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Build browser-like request headers
fn build_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(random_user_agent()));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers
}

/// File size and MIME type of a remote image
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileInfo {
    pub size: Option<u64>,
    pub mime: Option<String>,
}

/// Looks up image size and type with HEAD requests
pub struct ImageMetaFetcher {
    client: Client,
}

impl ImageMetaFetcher {
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Size and type of the resource at `url`
    ///
    /// CDNs that refuse HEAD are asked for the first byte instead; the total
    /// size then comes from `Content-Range`.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::ServerError` when both attempts are refused
    pub async fn file_info(&self, url: &str) -> Result<FileInfo, FetchError> {
        let head = self
            .client
            .head(url)
            .header(USER_AGENT, random_user_agent())
            .send()
            .await?;
        if head.status().is_success() {
            return Ok(info_from(&head, false));
        }
        if !matches!(head.status(), StatusCode::METHOD_NOT_ALLOWED | StatusCode::FORBIDDEN) {
            return Err(FetchError::ServerError(head.status().as_u16()));
        }

        let ranged = self
            .client
            .get(url)
            .header(USER_AGENT, random_user_agent())
            .header(RANGE, "bytes=0-0")
            .send()
            .await?;
        if ranged.status().is_success() {
            Ok(info_from(&ranged, ranged.status() == StatusCode::PARTIAL_CONTENT))
        } else {
            Err(FetchError::ServerError(ranged.status().as_u16()))
        }
    }

    /// Fill `size` and `mime` of `image` when missing. Failures only log.
    pub async fn enrich(&self, image: &mut ImageMeta) {
        if !image.needs_file_info() {
            return;
        }
        let Some(url) = image.url.clone() else {
            return;
        };
        match self.file_info(&url).await {
            Ok(info) => {
                if image.size.is_none() {
                    image.size = info.size;
                }
                if image.mime.is_none() {
                    image.mime = info.mime;
                }
            }
            Err(e) => debug!(url = %url, error = %e, "Image metadata unavailable"),
        }
    }
}

fn header_str<'r>(response: &'r Response, name: reqwest::header::HeaderName) -> Option<&'r str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

fn info_from(response: &Response, partial: bool) -> FileInfo {
    let size = if partial {
        header_str(response, CONTENT_RANGE)
            .and_then(|r| r.rsplit('/').next())
            .and_then(|total| total.trim().parse().ok())
    } else {
        header_str(response, CONTENT_LENGTH).and_then(|v| v.trim().parse().ok())
    };
    let mime = header_str(response, CONTENT_TYPE)
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .filter(|v| !v.is_empty());
    FileInfo { size, mime }
}
