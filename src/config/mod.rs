//! Configuration management for the fbmedia scraper
//!
//! This module handles loading and validating configuration from environment
//! variables (`FBMEDIA_*`) and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Crawl scope and limits
    pub crawler: CrawlerConfig,

    /// Infinite-scroll tuning
    pub scroll: ScrollConfig,

    /// Which identity fields are redacted before output
    pub privacy: PrivacyConfig,

    /// Browser launch settings
    pub browser: BrowserConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Crawler-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Group, album, photo or video URLs to start from
    pub start_urls: Vec<String>,

    /// Maximum number of pages visited at once
    pub max_concurrency: usize,

    /// Retries of a failed page visit
    pub max_request_retries: u32,

    /// Stop paginating a list once more items than this were enqueued
    pub output_max_entries: Option<usize>,

    /// Rate limit (requests per second) for plain HTTP fetches
    pub rate_limit: u32,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Drive a real browser instead of fetching static markup
    pub use_browser: bool,

    /// Look up file size and MIME type of found images
    pub enrich_images: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            start_urls: Vec::new(),
            max_concurrency: 4,
            max_request_retries: 3,
            output_max_entries: None,
            rate_limit: 2,
            request_timeout_secs: 30,
            use_browser: false,
            enrich_images: true,
        }
    }
}

/// Infinite-scroll configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Network must stay quiet this long to count as settled
    pub settle_idle_ms: u64,

    /// Upper bound on one settle wait
    pub settle_timeout_ms: u64,

    /// Fixed pause after each settle
    pub tick_delay_ms: u64,

    /// Consecutive ticks without new items before the list counts as exhausted
    pub max_idle_ticks: u32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            settle_idle_ms: 500,
            settle_timeout_ms: 10_000,
            tick_delay_ms: 250,
            max_idle_ticks: 3,
        }
    }
}

impl ScrollConfig {
    pub fn settle_idle(&self) -> Duration {
        Duration::from_millis(self.settle_idle_ms)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    pub fn tick_delay(&self) -> Duration {
        Duration::from_millis(self.tick_delay_ms)
    }
}

/// Privacy masking toggles, one per identity field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    pub author_name: bool,
    pub author_profile_url: bool,
    pub author_profile_image_thumb: bool,
    pub owner_name: bool,
    pub owner_profile_url: bool,
    pub contributor_name: bool,
    pub contributor_profile_url: bool,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self::all(true)
    }
}

impl PrivacyConfig {
    /// Every toggle set to `mask`
    pub fn all(mask: bool) -> Self {
        Self {
            author_name: mask,
            author_profile_url: mask,
            author_profile_image_thumb: mask,
            owner_name: mask,
            owner_profile_url: mask,
            contributor_name: mask,
            contributor_profile_url: mask,
        }
    }
}

/// Browser launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,

    /// Chrome executable; searched in common locations when unset
    pub chrome_path: Option<PathBuf>,

    pub window_width: u32,
    pub window_height: u32,

    /// Proxy server passed to Chrome, e.g. `http://127.0.0.1:8080`
    pub proxy: Option<String>,

    /// How often open pages are checked for popups to close
    pub popup_interval_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            window_width: 1366,
            window_height: 900,
            proxy: None,
            popup_interval_ms: 1000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref().map(str::trim) {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let start_urls = std::env::var("FBMEDIA_START_URLS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let output_max_entries = std::env::var("FBMEDIA_OUTPUT_MAX_ENTRIES")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok());

        let crawler = CrawlerConfig {
            start_urls,
            max_concurrency: env_or("FBMEDIA_MAX_CONCURRENCY", defaults.crawler.max_concurrency),
            max_request_retries: env_or(
                "FBMEDIA_MAX_REQUEST_RETRIES",
                defaults.crawler.max_request_retries,
            ),
            output_max_entries,
            rate_limit: env_or("FBMEDIA_RATE_LIMIT", defaults.crawler.rate_limit),
            request_timeout_secs: env_or(
                "FBMEDIA_REQUEST_TIMEOUT",
                defaults.crawler.request_timeout_secs,
            ),
            use_browser: env_flag("FBMEDIA_USE_BROWSER", defaults.crawler.use_browser),
            enrich_images: env_flag("FBMEDIA_ENRICH_IMAGES", defaults.crawler.enrich_images),
        };

        let scroll = ScrollConfig {
            max_idle_ticks: env_or("FBMEDIA_MAX_IDLE_TICKS", defaults.scroll.max_idle_ticks),
            ..defaults.scroll
        };

        let privacy = if env_flag("FBMEDIA_DISABLE_MASKING", false) {
            PrivacyConfig::all(false)
        } else {
            defaults.privacy
        };

        let browser = BrowserConfig {
            headless: env_flag("FBMEDIA_HEADLESS", defaults.browser.headless),
            chrome_path: std::env::var("FBMEDIA_CHROME_PATH").ok().map(PathBuf::from),
            proxy: std::env::var("FBMEDIA_PROXY").ok(),
            ..defaults.browser
        };

        let logging = LoggingConfig {
            level: std::env::var("FBMEDIA_LOG_LEVEL").unwrap_or(defaults.logging.level),
            format: std::env::var("FBMEDIA_LOG_FORMAT").unwrap_or(defaults.logging.format),
        };

        Ok(Self {
            crawler,
            scroll,
            privacy,
            browser,
            logging,
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.crawler.max_concurrency == 0 {
            anyhow::bail!("max_concurrency must be greater than 0");
        }

        if self.crawler.rate_limit == 0 {
            anyhow::bail!("rate_limit must be positive");
        }

        for url in &self.crawler.start_urls {
            url::Url::parse(url).with_context(|| format!("Invalid start URL: {url}"))?;
        }

        if self.scroll.max_idle_ticks == 0 {
            anyhow::bail!("max_idle_ticks must be greater than 0");
        }

        if self.scroll.settle_timeout_ms < self.scroll.settle_idle_ms {
            anyhow::bail!("settle_timeout_ms must not be shorter than settle_idle_ms");
        }

        if self.browser.popup_interval_ms == 0 {
            anyhow::bail!("popup_interval_ms must be greater than 0");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("log format must be 'text' or 'json'");
        }

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.crawler.request_timeout_secs)
    }
}
