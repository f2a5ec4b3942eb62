//! Index session: owns the SQLite connection and runs builder statements.

use crate::config::IndexConfig;
use crate::{PodindexError, Result};
use rusqlite::{Connection, OpenFlags, StatementStatus};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::builder::{StatementBuilder, TableDescriptor};
use super::cursor::SearchCursor;
use super::fts5::{self, IndexStats};
use super::progress::{NoProgress, ProgressEstimate, ProgressReporter, TracingProgress};

/// Lifecycle of the index behind a session, as found in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    /// Connected; no index table yet.
    Connected,
    /// Index table exists but holds no rows.
    Created,
    /// Index table is populated and searchable.
    Indexed,
}

/// Outcome of one population run.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulateReport {
    /// Base-table records counted before the copy.
    pub records: u64,
    /// Rows inserted into the index.
    pub inserted: u64,
    pub estimate: ProgressEstimate,
    /// VM steps run during population, FTS5's internal statements included.
    pub engine_steps: u64,
    /// VM steps of the outer `INSERT ... SELECT` alone.
    pub statement_steps: u64,
    /// Sum of every progress advance; a multiple of the granularity.
    pub reported_steps: u64,
}

/// A connection to one store, scoped to one base table and its index.
pub struct IndexSession {
    db_path: Option<PathBuf>,
    conn: Connection,
    builder: StatementBuilder,
    descriptor: TableDescriptor,
    config: IndexConfig,
}

impl IndexSession {
    /// Open an existing store file.
    pub fn open(
        db_path: impl Into<PathBuf>,
        descriptor: TableDescriptor,
        config: IndexConfig,
    ) -> Result<Self> {
        let db_path = db_path.into();
        if !db_path.is_file() {
            return Err(PodindexError::schema(format!(
                "Database file not found: {}",
                db_path.display()
            )));
        }

        let conn = Connection::open_with_flags(
            &db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        let mut session = Self::with_connection(conn, descriptor, config)?;
        session.db_path = Some(db_path);
        debug!("Opened index session on {:?}", session.db_path);
        Ok(session)
    }

    /// Wrap an already open connection.
    pub fn with_connection(
        conn: Connection,
        descriptor: TableDescriptor,
        config: IndexConfig,
    ) -> Result<Self> {
        config.validate()?;
        let builder = StatementBuilder::new(&descriptor)?;
        Self::configure_connection(&conn)?;

        Ok(Self {
            db_path: None,
            conn,
            builder,
            descriptor,
            config,
        })
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.busy_timeout(crate::config::IndexDefaults::BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA temp_store=MEMORY;")?;
        conn.set_prepared_statement_cache_capacity(
            crate::config::IndexDefaults::STATEMENT_CACHE_CAPACITY,
        );
        Ok(())
    }

    /// Path of the store, if opened from a file.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn descriptor(&self) -> &TableDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn index_name(&self) -> &str {
        self.builder.index_name()
    }

    /// Number of records in the base table.
    pub fn count(&self) -> Result<u64> {
        let table = self.builder.table();
        if !fts5::relation_exists(&self.conn, table)? {
            return Err(PodindexError::schema(format!("no such table: {}", table)));
        }

        let mut stmt = self.conn.prepare(&self.builder.build_count_statement())?;
        let mut rows = stmt.query([])?;
        let count: i64 = match rows.next()? {
            Some(row) => row.get(0)?,
            None => {
                return Err(PodindexError::schema(format!(
                    "Count query on {} returned no rows",
                    table
                )))
            }
        };
        if rows.next()?.is_some() {
            return Err(PodindexError::schema(format!(
                "Count query on {} returned more than one row",
                table
            )));
        }

        debug!("{} has {} records", table, count);
        Ok(count.max(0) as u64)
    }

    /// Whether the derived index table exists.
    pub fn index_exists(&self) -> Result<bool> {
        fts5::table_exists(&self.conn, self.builder.index_name())
    }

    /// Create the FTS5 index table. Not idempotent.
    pub fn build_index(&self) -> Result<()> {
        let index = self.builder.index_name();
        if self.index_exists()? {
            return Err(PodindexError::IndexAlreadyExists {
                index: index.to_string(),
            });
        }

        self.conn.execute(&self.builder.build_create_statement(), [])?;
        info!(
            "Created FTS5 index {} over {}({})",
            index,
            self.builder.table(),
            self.builder.fields().collect::<Vec<_>>().join(", ")
        );
        Ok(())
    }

    /// Copy the base table into the index, logging progress when asked.
    pub fn populate_index(&mut self, show_progress: bool) -> Result<PopulateReport> {
        let records = self.count()?;
        let estimate = ProgressEstimate::for_records(records, &self.config);
        let reporter: Arc<dyn ProgressReporter> = if show_progress {
            Arc::new(TracingProgress::new(
                format!("populating {}", self.builder.index_name()),
                estimate.total_expected_steps,
            ))
        } else {
            Arc::new(NoProgress)
        };
        self.run_populate(records, estimate, reporter)
    }

    /// Copy the base table into the index, reporting to `reporter`.
    pub fn populate_index_with(
        &mut self,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<PopulateReport> {
        let records = self.count()?;
        let estimate = ProgressEstimate::for_records(records, &self.config);
        self.run_populate(records, estimate, reporter)
    }

    fn run_populate(
        &mut self,
        records: u64,
        estimate: ProgressEstimate,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<PopulateReport> {
        let index = self.builder.index_name().to_string();
        if !self.index_exists()? {
            return Err(PodindexError::schema(format!("no such index: {}", index)));
        }

        let sql = self.builder.build_populate_statement();
        let granularity = self.config.progress_granularity;
        let counters = Arc::new(HookCounters::default());
        let panicked = Arc::new(AtomicBool::new(false));

        info!(
            "Populating {} from {} records (~{} steps expected)",
            index, records, estimate.total_expected_steps
        );

        let tx = self.conn.transaction()?;
        let outcome = {
            let _hook = ProgressHook::attach(
                &tx,
                granularity,
                Arc::clone(&reporter),
                Arc::clone(&counters),
                Arc::clone(&panicked),
            );
            execute_populate(&tx, &sql)
        };
        reporter.finish();

        let (inserted, statement_steps) = match outcome {
            Ok(counts) => counts,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!("Rollback of {} failed: {}", index, rollback_err);
                }
                if panicked.load(Ordering::SeqCst) {
                    return Err(PodindexError::PopulateAborted {
                        message: format!("progress reporter panicked while populating {}", index),
                    });
                }
                return Err(e);
            }
        };
        tx.commit()?;

        let report = PopulateReport {
            records,
            inserted,
            estimate,
            engine_steps: counters.engine_steps.load(Ordering::SeqCst),
            statement_steps,
            reported_steps: counters.reported_steps.load(Ordering::SeqCst),
        };
        info!(
            "Populated {} with {} rows ({} engine steps)",
            index, report.inserted, report.engine_steps
        );
        Ok(report)
    }

    /// Search `fields` (all configured fields when `None`) for `term`.
    ///
    /// Returns a cursor projecting `out_fields` from the base table.
    pub fn search(
        &self,
        term: &str,
        out_fields: &[&str],
        fields: Option<&[&str]>,
    ) -> Result<SearchCursor<'_>> {
        let configured: Vec<&str> = self.builder.fields().collect();
        let fields = fields.unwrap_or(configured.as_slice());

        let statement = self.builder.build_search_statement(fields, out_fields)?;
        let parameter = statement.match_parameter(term)?;

        if !self.index_exists()? {
            return Err(PodindexError::schema(format!(
                "no such index: {}",
                self.builder.index_name()
            )));
        }

        // The index may have been built over fewer fields than this session names
        let indexed = fts5::index_columns(&self.conn, self.builder.index_identifier())?;
        if !fields
            .iter()
            .all(|f| indexed.iter().any(|c| c.eq_ignore_ascii_case(f)))
        {
            return Err(PodindexError::FieldSubset {
                requested: fields.iter().map(|f| f.to_string()).collect(),
                configured: indexed,
            });
        }

        let stmt = self.conn.prepare_cached(statement.sql())?;
        debug!("Searching {:?} in {:?}", parameter, fields);

        let columns = statement
            .out_fields()
            .iter()
            .map(|f| f.as_str().to_string())
            .collect();
        Ok(SearchCursor::new(stmt, parameter, columns))
    }

    /// Derive the lifecycle state from the store.
    pub fn state(&self) -> Result<SessionState> {
        if !self.index_exists()? {
            return Ok(SessionState::Connected);
        }
        if fts5::has_rows(&self.conn, self.builder.index_identifier())? {
            Ok(SessionState::Indexed)
        } else {
            Ok(SessionState::Created)
        }
    }

    /// Row count of the index.
    pub fn stats(&self) -> Result<IndexStats> {
        if !self.index_exists()? {
            return Err(PodindexError::schema(format!(
                "no such index: {}",
                self.builder.index_name()
            )));
        }
        Ok(IndexStats {
            index_name: self.builder.index_name().to_string(),
            row_count: fts5::row_count(&self.conn, self.builder.index_identifier())?,
        })
    }

    /// Drop cached prepared statements; the next search prepares afresh.
    pub fn reset_cursor(&self) {
        self.conn.flush_prepared_statement_cache();
    }

    /// Close the connection, surfacing any error SQLite reports.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| PodindexError::from(e))
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn execute_populate(conn: &Connection, sql: &str) -> Result<(u64, u64)> {
    let mut stmt = conn.prepare(sql)?;
    let inserted = stmt.execute([])?;
    let statement_steps = stmt.get_status(StatementStatus::VmStep);
    Ok((inserted as u64, statement_steps.max(0) as u64))
}

#[derive(Debug, Default)]
struct HookCounters {
    engine_steps: AtomicU64,
    reported_steps: AtomicU64,
}

/// SQLite progress handler forwarding to a reporter; detached on drop.
///
/// SQLite restarts its step count for every statement it runs, nested FTS5
/// shadow-table statements included, so a handler registered every N steps
/// drops each statement's remainder. The handler therefore fires on every
/// step and the reporter is advanced once per full block of `granularity`
/// steps, keeping the reported total within one block of `engine_steps`.
struct ProgressHook<'a> {
    conn: &'a Connection,
}

impl<'a> ProgressHook<'a> {
    fn attach(
        conn: &'a Connection,
        granularity: u32,
        reporter: Arc<dyn ProgressReporter>,
        counters: Arc<HookCounters>,
        panicked: Arc<AtomicBool>,
    ) -> Self {
        let block = u64::from(granularity);
        let reporter = AssertUnwindSafe(reporter);
        let mut pending: u64 = 0;
        conn.progress_handler(
            1,
            Some(move || {
                counters.engine_steps.fetch_add(1, Ordering::Relaxed);
                pending += 1;
                if pending < block {
                    return false;
                }
                pending = 0;
                match panic::catch_unwind(AssertUnwindSafe(|| reporter.advance(block))) {
                    Ok(()) => {
                        counters.reported_steps.fetch_add(block, Ordering::SeqCst);
                        false
                    }
                    Err(_) => {
                        // Returning true interrupts the statement
                        panicked.store(true, Ordering::SeqCst);
                        true
                    }
                }
            }),
        );
        Self { conn }
    }
}

impl Drop for ProgressHook<'_> {
    fn drop(&mut self) {
        self.conn.progress_handler(0, None::<fn() -> bool>);
    }
}
