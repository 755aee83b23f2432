use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fbmedia::config::Config;
use fbmedia::crawler::dataset::JsonLinesDataset;
use fbmedia::crawler::queue::MemoryQueue;
use fbmedia::crawler::{Backend, Crawler};
use fbmedia::router::match_url;

#[derive(Parser)]
#[command(
    name = "fbmedia",
    version,
    about = "Facebook group media scraper for photos, videos and albums",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the config file
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl group, album, photo or video URLs
    Crawl {
        /// Start URLs (added to those in the config)
        urls: Vec<String>,

        /// TOML config file; environment variables are used otherwise
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// JSON-lines output file
        #[arg(short, long, default_value = "output/records.jsonl")]
        output: PathBuf,

        /// Stop paginating a list after more than this many items
        #[arg(short, long)]
        max_entries: Option<usize>,

        /// Maximum number of pages visited at once
        #[arg(long)]
        max_concurrency: Option<usize>,

        /// Drive Chrome instead of fetching static markup
        #[arg(long, default_value = "false")]
        browser: bool,

        /// Keep author and owner identities in the output
        #[arg(long, default_value = "false")]
        no_masking: bool,
    },

    /// Print how URLs are classified
    Route {
        /// URLs to classify
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl {
            urls,
            config,
            output,
            max_entries,
            max_concurrency,
            browser,
            no_masking,
        } => {
            let mut config = match config {
                Some(path) => Config::from_file(&path)?,
                None => Config::from_env()?,
            };
            config.crawler.start_urls.extend(urls);
            if max_entries.is_some() {
                config.crawler.output_max_entries = max_entries;
            }
            if let Some(n) = max_concurrency {
                config.crawler.max_concurrency = n;
            }
            config.crawler.use_browser |= browser;
            if no_masking {
                config.privacy = fbmedia::config::PrivacyConfig::all(false);
            }

            let format = cli
                .log_format
                .clone()
                .unwrap_or_else(|| config.logging.format.clone());
            setup_tracing(&format, &config.logging.level, cli.verbose)?;

            tracing::info!(
                start_urls = config.crawler.start_urls.len(),
                output = %output.display(),
                max_entries = ?config.crawler.output_max_entries,
                browser = config.crawler.use_browser,
                "Starting crawl command"
            );
            crawl(config, output).await?;
        }

        Commands::Route { urls } => {
            setup_tracing(cli.log_format.as_deref().unwrap_or("text"), "warn", cli.verbose)?;
            route(&urls)?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("fbmedia=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("fbmedia={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    Ok(())
}

async fn crawl(config: Config, output: PathBuf) -> Result<()> {
    if config.crawler.start_urls.is_empty() {
        anyhow::bail!("No start URLs given (pass URLs or set FBMEDIA_START_URLS)");
    }

    let backend = Backend::from_config(&config).await?;
    let dataset = JsonLinesDataset::open(&output)
        .await
        .with_context(|| format!("Failed to open dataset {}", output.display()))?;
    let crawler = Crawler::new(
        config,
        backend,
        Arc::new(MemoryQueue::new()),
        Arc::new(dataset),
    )?;

    let stats = crawler.run().await?;

    println!("Crawl finished");
    println!("  Pages visited: {}", stats.pages_visited);
    println!("  Pages failed: {}", stats.pages_failed);
    println!("  Pages skipped: {}", stats.pages_skipped);
    println!("  Records written: {}", stats.records_written);
    println!("  Links enqueued: {}", stats.links_enqueued);
    println!("  Output: {}", output.display());
    Ok(())
}

fn route(urls: &[String]) -> Result<()> {
    for url in urls {
        match match_url(url) {
            Some(m) => println!("{}", serde_json::to_string(&m)?),
            None => println!("{{\"url\":{},\"route\":null}}", serde_json::to_string(url)?),
        }
    }
    Ok(())
}
