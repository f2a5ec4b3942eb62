//! podindex core - full-text indexing and search over the PodcastIndex feeds database.
//!
//! The index is an SQLite FTS5 table derived from a base table. An
//! [`IndexSession`] counts the base table, creates the index, populates it
//! with progress reporting and answers term searches.
//!
//! # Example
//!
//! ```rust,no_run
//! use podindex_core::{IndexConfig, IndexSession, TableDescriptor};
//!
//! fn main() -> podindex_core::Result<()> {
//!     let mut session = IndexSession::open(
//!         "podcastindex_feeds.db",
//!         TableDescriptor::new("podcasts", ["title", "description"]),
//!         IndexConfig::default(),
//!     )?;
//!
//!     println!("{} records", session.count()?);
//!     session.build_index()?;
//!     session.populate_index(true)?;
//!
//!     let mut cursor = session.search("rust", &["id", "title"], None)?;
//!     for row in cursor.rows()? {
//!         println!("{}", row?.to_json());
//!     }
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod index;
pub mod network;

pub use config::{DownloadOptions, ExtractOptions, IndexConfig};
pub use error::{PodindexError, Result};
pub use index::{
    IndexSession, PopulateReport, ProgressReporter, ResultRow, SearchCursor, SessionState,
    TableDescriptor,
};
