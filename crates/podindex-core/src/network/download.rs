//! Archive download with progress reporting.
//!
//! Streams the response body into `<destination>.part` and renames it into
//! place once complete, so a failed transfer never leaves a truncated
//! archive behind.

use crate::config::{DownloadOptions, SourceConfig};
use crate::{PodindexError, Result};
use futures::StreamExt;
use reqwest::Client;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Progress information for a download.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    /// Bytes downloaded so far.
    pub bytes_downloaded: u64,
    /// Total bytes, when the server sends a content length.
    pub total_bytes: Option<u64>,
    /// Percentage complete (0-100).
    pub percent: Option<f64>,
}

impl DownloadProgress {
    fn new(bytes_downloaded: u64, total_bytes: Option<u64>) -> Self {
        let percent = total_bytes.map(|total| {
            if total > 0 {
                (bytes_downloaded as f64 / total as f64) * 100.0
            } else {
                0.0
            }
        });

        Self {
            bytes_downloaded,
            total_bytes,
            percent,
        }
    }
}

/// Downloads source archives over HTTP.
pub struct DownloadManager {
    client: Client,
    progress_interval: Duration,
    temp_suffix: String,
}

impl DownloadManager {
    /// Create a download manager with default settings.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(SourceConfig::CONNECT_TIMEOUT)
            .user_agent(SourceConfig::USER_AGENT)
            .build()
            .map_err(|e| PodindexError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;
        Ok(Self::with_client(client))
    }

    /// Create a download manager around an existing client.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            progress_interval: SourceConfig::PROGRESS_INTERVAL,
            temp_suffix: SourceConfig::DOWNLOAD_TEMP_SUFFIX.to_string(),
        }
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Download `options.url` to `options.destination`.
    ///
    /// Returns the number of bytes written. A non-success status fails with
    /// [`PodindexError::Transfer`]; nothing is retried.
    pub async fn download(
        &self,
        options: &DownloadOptions,
        progress_tx: Option<mpsc::Sender<DownloadProgress>>,
    ) -> Result<u64> {
        let destination = options.destination.as_path();

        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| PodindexError::io_with_path(e, parent))?;
            }
        }

        let temp_path = PathBuf::from(format!("{}{}", destination.display(), self.temp_suffix));

        match self.do_download(options, &temp_path, progress_tx).await {
            Ok(bytes) => {
                std::fs::rename(&temp_path, destination).map_err(|e| {
                    let _ = std::fs::remove_file(&temp_path);
                    PodindexError::Io {
                        message: format!("Failed to move download to final destination: {}", e),
                        path: Some(destination.to_path_buf()),
                        source: Some(e),
                    }
                })?;

                info!("Downloaded {} bytes to {}", bytes, destination.display());
                Ok(bytes)
            }
            Err(e) => {
                let _ = std::fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }

    async fn do_download(
        &self,
        options: &DownloadOptions,
        temp_path: &Path,
        progress_tx: Option<mpsc::Sender<DownloadProgress>>,
    ) -> Result<u64> {
        let url = options.url.as_str();
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(PodindexError::Transfer {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let total_bytes = response.content_length();
        debug!("Downloading {} ({:?} bytes)", url, total_bytes);

        let file = std::fs::File::create(temp_path)
            .map_err(|e| PodindexError::io_with_path(e, temp_path))?;
        let mut writer = BufWriter::with_capacity(options.chunk_size.max(1), file);

        let mut bytes_downloaded: u64 = 0;
        let mut last_progress_update = Instant::now();
        let mut stream = response.bytes_stream();

        if let Some(ref tx) = progress_tx {
            let _ = tx.send(DownloadProgress::new(0, total_bytes)).await;
        }

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| PodindexError::Network {
                message: format!("Error reading download stream: {}", e),
                source: Some(e),
            })?;

            writer
                .write_all(&chunk)
                .map_err(|e| PodindexError::io_with_path(e, temp_path))?;
            bytes_downloaded += chunk.len() as u64;

            if last_progress_update.elapsed() >= self.progress_interval {
                if let Some(ref tx) = progress_tx {
                    let _ = tx
                        .send(DownloadProgress::new(bytes_downloaded, total_bytes))
                        .await;
                }
                last_progress_update = Instant::now();
            }
        }

        writer
            .flush()
            .map_err(|e| PodindexError::io_with_path(e, temp_path))?;

        if let Some(ref tx) = progress_tx {
            let _ = tx
                .send(DownloadProgress::new(bytes_downloaded, total_bytes))
                .await;
        }

        Ok(bytes_downloaded)
    }
}
