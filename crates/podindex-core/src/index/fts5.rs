//! Catalog lookups for the base table and its FTS5 index.

use super::builder::{Identifier, ID_COLUMN};
use crate::Result;
use rusqlite::Connection;
use serde::Serialize;

/// Statistics about an FTS5 index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub index_name: String,
    pub row_count: u64,
}

/// Check whether a table (plain or virtual) exists.
pub fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1 COLLATE NOCASE",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Check whether a table or view exists; either can serve as the base relation.
pub fn relation_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master \
         WHERE type IN ('table', 'view') AND name=?1 COLLATE NOCASE",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Searchable columns of a built index, in declaration order. The id column
/// is left out.
pub fn index_columns(conn: &Connection, index: &Identifier) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
    let columns = stmt
        .query_map([index.as_str()], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns
        .into_iter()
        .filter(|c| !c.eq_ignore_ascii_case(ID_COLUMN))
        .collect())
}

/// Number of rows in a table. The name must already be validated.
pub fn row_count(conn: &Connection, table: &Identifier) -> Result<u64> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })?;
    Ok(count.max(0) as u64)
}

/// Whether the index holds at least one row.
pub fn has_rows(conn: &Connection, table: &Identifier) -> Result<bool> {
    let found: i64 = conn.query_row(
        &format!("SELECT EXISTS (SELECT 1 FROM {})", table),
        [],
        |row| row.get(0),
    )?;
    Ok(found != 0)
}
