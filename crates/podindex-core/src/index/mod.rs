//! SQLite FTS5 index over a base table.
//!
//! This module provides:
//! - Statement building with validated identifiers and a bound search term
//! - An index session that counts, builds, populates and searches
//! - Progress reporting driven by SQLite's VM step counter

mod builder;
mod cursor;
mod fts5;
mod progress;
mod session;

pub use builder::{
    escape_term, Identifier, SearchStatement, StatementBuilder, TableDescriptor, ID_COLUMN,
    INDEX_SUFFIX,
};
pub use cursor::{ResultRow, SearchCursor, SearchRows};
pub use fts5::IndexStats;
pub use progress::{
    CountingProgress, NoProgress, ProgressEstimate, ProgressReporter, TracingProgress,
};
pub use session::{IndexSession, PopulateReport, SessionState};
