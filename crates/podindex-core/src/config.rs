//! Centralized configuration for podindex.
//!
//! Constant holders carry the defaults; the runtime structs
//! ([`IndexConfig`], [`DownloadOptions`], [`ExtractOptions`]) are passed
//! explicitly into each operation so no process-wide state exists.

use crate::{PodindexError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Source archive configuration.
pub struct SourceConfig;

impl SourceConfig {
    pub const DOWNLOAD_URL: &'static str =
        "https://public.podcastindex.org/podcastindex_feeds.db.tgz";
    pub const DOWNLOAD_CHUNK_SIZE: usize = 5 * (1 << 20); // 5MiB
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".part";
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
    pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);
    pub const USER_AGENT: &'static str = "podindex/0.1";
}

/// Default table and field selection for the PodcastIndex database.
pub struct SearchDefaults;

impl SearchDefaults {
    pub const TABLE: &'static str = "podcasts";
    pub const SEARCH_FIELDS: &'static [&'static str] = &["title", "description"];
    pub const OUT_FIELDS: &'static [&'static str] = &["id", "podcastGuid", "title"];
}

/// Index population defaults.
pub struct IndexDefaults;

impl IndexDefaults {
    /// Empirical SQLite VM steps spent per copied record.
    pub const STEPS_PER_RECORD: f64 = 50.6;
    pub const PROGRESS_GRANULARITY: u32 = 1000;
    /// Percentage between two progress log lines.
    pub const PROGRESS_LOG_PERCENT: u64 = 5;
    pub const BUSY_TIMEOUT: Duration = Duration::from_secs(30);
    pub const STATEMENT_CACHE_CAPACITY: usize = 16;
}

/// Runtime settings for an [`IndexSession`](crate::index::IndexSession).
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    /// Calibration multiplier used to estimate total work. Tune per engine.
    pub steps_per_record: f64,
    /// VM steps between two progress callbacks.
    pub progress_granularity: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            steps_per_record: IndexDefaults::STEPS_PER_RECORD,
            progress_granularity: IndexDefaults::PROGRESS_GRANULARITY,
        }
    }
}

impl IndexConfig {
    pub fn with_steps_per_record(mut self, steps_per_record: f64) -> Self {
        self.steps_per_record = steps_per_record;
        self
    }

    pub fn with_progress_granularity(mut self, granularity: u32) -> Self {
        self.progress_granularity = granularity;
        self
    }

    /// Check the values are usable.
    pub fn validate(&self) -> Result<()> {
        if !self.steps_per_record.is_finite() || self.steps_per_record <= 0.0 {
            return Err(PodindexError::config(format!(
                "steps_per_record must be a positive number, got {}",
                self.steps_per_record
            )));
        }
        // SQLite takes the interval as a C int.
        if self.progress_granularity == 0 || self.progress_granularity > i32::MAX as u32 {
            return Err(PodindexError::config(format!(
                "progress_granularity must be in 1..={}, got {}",
                i32::MAX,
                self.progress_granularity
            )));
        }
        Ok(())
    }
}

/// Parameters for downloading the source archive.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub url: String,
    pub destination: PathBuf,
    /// Write buffer size in bytes.
    pub chunk_size: usize,
}

impl DownloadOptions {
    /// Options for `url`, saved under its own file name in the current directory.
    pub fn for_url(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let destination = PathBuf::from(archive_file_name(&url)?);
        Ok(Self {
            url,
            destination,
            chunk_size: SourceConfig::DOWNLOAD_CHUNK_SIZE,
        })
    }

    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = destination.into();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

/// Parameters for extracting the database from the archive.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub archive: PathBuf,
    pub member: String,
    pub out_dir: PathBuf,
}

impl ExtractOptions {
    /// Extract the member derived from the archive name into the current directory.
    pub fn for_archive(archive: impl Into<PathBuf>) -> Result<Self> {
        let archive = archive.into();
        let file_name = archive
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                PodindexError::config(format!("Archive path has no file name: {}", archive.display()))
            })?;
        let member = database_name(file_name)?;
        Ok(Self {
            archive,
            member,
            out_dir: PathBuf::from("."),
        })
    }

    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = member.into();
        self
    }

    pub fn with_out_dir(mut self, out_dir: impl Into<PathBuf>) -> Self {
        self.out_dir = out_dir.into();
        self
    }
}

/// Derive the archive file name from its download URL.
///
/// `https://host/podcastindex_feeds.db.tgz` → `podcastindex_feeds.db.tgz`
pub fn archive_file_name(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url)
        .map_err(|e| PodindexError::config(format!("Invalid download URL {}: {}", url, e)))?;
    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| PodindexError::config(format!("Download URL has no file name: {}", url)))
}

/// Derive the database file name by dropping the archive extension.
///
/// `podcastindex_feeds.db.tgz` → `podcastindex_feeds.db`
pub fn database_name(archive_file_name: &str) -> Result<String> {
    Path::new(archive_file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            PodindexError::config(format!(
                "Cannot derive a database name from {}",
                archive_file_name
            ))
        })
}

/// Default database path, derived from the default download URL.
pub fn default_database_path() -> PathBuf {
    archive_file_name(SourceConfig::DOWNLOAD_URL)
        .and_then(|archive| database_name(&archive))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("podcastindex_feeds.db"))
}
