//! Dataset sinks for finished records
//!
//! Records arrive already masked, as JSON objects.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::utils::error::CrawlerError;

/// Destination for output records
#[async_trait]
pub trait DatasetSink: Send + Sync {
    async fn push(&self, record: Value) -> Result<(), CrawlerError>;
}

/// Appends one JSON object per line to a file
pub struct JsonLinesDataset {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesDataset {
    /// Open `path` for appending, creating parent directories as needed
    ///
    /// # Errors
    ///
    /// Returns `CrawlerError::Dataset` if the file cannot be opened
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CrawlerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CrawlerError::Dataset(format!("{}: {e}", parent.display())))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| CrawlerError::Dataset(format!("{}: {e}", path.display())))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DatasetSink for JsonLinesDataset {
    async fn push(&self, record: Value) -> Result<(), CrawlerError> {
        let mut line =
            serde_json::to_string(&record).map_err(|e| CrawlerError::Dataset(e.to_string()))?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| CrawlerError::Dataset(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| CrawlerError::Dataset(e.to_string()))?;
        debug!(path = %self.path.display(), "Record written");
        Ok(())
    }
}

/// Keeps records in memory
#[derive(Default)]
pub struct MemoryDataset {
    records: Mutex<Vec<Value>>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<Value> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl DatasetSink for MemoryDataset {
    async fn push(&self, record: Value) -> Result<(), CrawlerError> {
        self.records.lock().await.push(record);
        Ok(())
    }
}
