//! Lazy, single-pass search results.

use crate::{PodindexError, Result};
use rusqlite::types::Value;
use rusqlite::{CachedStatement, Rows};

/// One projected result row, values in requested output-field order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    values: Vec<Value>,
}

impl ResultRow {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Render as a JSON array; blobs become hex strings.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.values.iter().map(value_to_json).collect())
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Real(f) => serde_json::Value::from(*f),
        Value::Text(s) => serde_json::Value::from(s.as_str()),
        Value::Blob(bytes) => serde_json::Value::from(
            bytes.iter().map(|b| format!("{:02x}", b)).collect::<String>(),
        ),
    }
}

/// A prepared search bound to one term.
///
/// Results are pulled from SQLite as the caller iterates. A cursor runs
/// once; re-issue the search to iterate again.
pub struct SearchCursor<'conn> {
    stmt: CachedStatement<'conn>,
    parameter: String,
    columns: Vec<String>,
    consumed: bool,
}

impl std::fmt::Debug for SearchCursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchCursor")
            .field("parameter", &self.parameter)
            .field("columns", &self.columns)
            .field("consumed", &self.consumed)
            .finish_non_exhaustive()
    }
}

impl<'conn> SearchCursor<'conn> {
    pub(crate) fn new(stmt: CachedStatement<'conn>, parameter: String, columns: Vec<String>) -> Self {
        Self {
            stmt,
            parameter,
            columns,
            consumed: false,
        }
    }

    /// Output field names, in row order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The value bound to the match parameter.
    pub fn match_parameter(&self) -> &str {
        &self.parameter
    }

    /// Execute and iterate the results.
    pub fn rows(&mut self) -> Result<SearchRows<'_>> {
        if self.consumed {
            return Err(PodindexError::CursorConsumed);
        }
        self.consumed = true;

        let width = self.columns.len();
        let rows = self.stmt.query([self.parameter.as_str()])?;
        Ok(SearchRows { rows, width })
    }

    /// Drain every row into memory.
    pub fn collect_rows(&mut self) -> Result<Vec<ResultRow>> {
        self.rows()?.collect()
    }
}

/// Forward-only iterator over search results.
pub struct SearchRows<'stmt> {
    rows: Rows<'stmt>,
    width: usize,
}

impl Iterator for SearchRows<'_> {
    type Item = Result<ResultRow>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.rows.next() {
            Ok(Some(row)) => {
                let values = (0..self.width)
                    .map(|i| row.get::<_, Value>(i))
                    .collect::<rusqlite::Result<Vec<_>>>();
                Some(values.map(ResultRow::new).map_err(PodindexError::from))
            }
            Ok(None) => None,
            Err(e) => Some(Err(e.into())),
        }
    }
}
