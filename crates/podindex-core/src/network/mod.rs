//! Network access for fetching the source archive.

mod download;

pub use download::{DownloadManager, DownloadProgress};
