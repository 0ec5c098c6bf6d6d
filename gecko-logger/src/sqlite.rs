//! SQLite backend: one `loghttp` row per entry, one transaction per flush.
//!
//! The logger owns a single connection. Contention from other processes
//! reading or writing the same database surfaces as `SQLITE_BUSY` /
//! `SQLITE_LOCKED`; those inserts are retried with [`RetryPolicy`], any other
//! failure skips the entry and the rest of the batch still commits.

use crate::error::LogError;
use crate::file::prepare_parent;
use crate::logger::{Logger, LoggerOptions};
use crate::registry::PathClaim;
use crate::retry::{Attempt, RetryPolicy};
use crate::sink::{BatchSink, FlushReport};
use chrono::SecondsFormat;
use gecko_core::LogEntry;
use rusqlite::{Connection, ErrorCode, Transaction, params};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

/// Buffered logger writing rows into a SQLite database.
pub type SqliteLogger = Logger<SqliteSink>;

pub const TABLE_NAME: &str = "loghttp";

const TABLE_EXISTS: &str =
    "SELECT count(name) FROM sqlite_master WHERE type = 'table' AND name = 'loghttp'";

pub const SCHEMA: &str = "
CREATE TABLE loghttp (
  id             INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
  timestamp      TEXT NOT NULL,
  host           TEXT NOT NULL,
  method         TEXT NOT NULL,
  ruta           TEXT NOT NULL,
  uri            TEXT NOT NULL,
  htmx           INT NOT NULL,
  status         INT NOT NULL,
  latency        INT NOT NULL,
  bytes_in       INT NOT NULL,
  bytes_out      INT NOT NULL,
  error          TEXT NOT NULL,
  remote_ip      TEXT NOT NULL,
  sesion         TEXT NOT NULL,
  user_agent     TEXT NOT NULL,
  referer        TEXT NOT NULL,
  hx_current_url TEXT NOT NULL,
  hx_target      TEXT NOT NULL,
  hx_trigger     TEXT NOT NULL,
  hx_boosted     INT NOT NULL
);";

const INSERT: &str = "INSERT INTO loghttp (
  timestamp, host, method, ruta, uri, htmx, status, latency, bytes_in, bytes_out,
  error, remote_ip, sesion, user_agent, referer, hx_current_url, hx_target, hx_trigger, hx_boosted
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)";

#[derive(Debug, Clone)]
pub struct SqliteLoggerConfig {
    pub options: LoggerOptions,
    /// How long SQLite itself waits on a lock before reporting busy.
    pub busy_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for SqliteLoggerConfig {
    fn default() -> Self {
        Self {
            options: LoggerOptions::default(),
            busy_timeout: Duration::from_millis(1000),
            retry: RetryPolicy::default(),
        }
    }
}

/// Transient contention: worth waiting for.
pub fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

fn int(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

/// Insert one row. The entry must carry a timestamp.
pub fn insert_entry(tx: &Transaction<'_>, entry: &LogEntry) -> rusqlite::Result<()> {
    let timestamp = entry
        .timestamp
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Nanos, true))
        .unwrap_or_default();
    let mut stmt = tx.prepare_cached(INSERT)?;
    stmt.execute(params![
        timestamp,
        entry.host,
        entry.method,
        entry.route,
        entry.uri,
        entry.htmx,
        entry.status,
        entry.latency_nanos(),
        int(entry.bytes_in),
        int(entry.bytes_out),
        entry.error.as_deref().unwrap_or(""),
        entry.remote_ip,
        entry.session.as_deref().unwrap_or(""),
        entry.user_agent,
        entry.referer,
        entry.hx_current_url,
        entry.hx_target,
        entry.hx_trigger,
        entry.hx_boosted,
    ])?;
    Ok(())
}

/// Insert every entry of `batch` inside `tx` with `insert`, retrying busy
/// inserts. Does not commit.
pub fn write_rows<F>(
    tx: &Transaction<'_>,
    batch: &[LogEntry],
    retry: &RetryPolicy,
    mut insert: F,
) -> FlushReport
where
    F: FnMut(&Transaction<'_>, &LogEntry) -> rusqlite::Result<()>,
{
    let mut report = FlushReport::default();
    for entry in batch {
        if !entry.has_timestamp() {
            warn!(uri = %entry.uri, "http log entry without timestamp, not persisted");
            report.rejected += 1;
            continue;
        }
        let outcome = retry.run(|| insert(tx, entry), is_busy);
        report.busy_retries += u64::from(outcome.retries());
        match outcome {
            Attempt::Done { .. } => report.written += 1,
            Attempt::Exhausted { retries, error } => {
                warn!(uri = %entry.uri, retries, error = %error, "database still busy, http log entry dropped");
                report.dropped += 1;
            }
            Attempt::Failed { error, .. } => {
                error!(uri = %entry.uri, error = %error, "cannot insert http log entry");
                report.dropped += 1;
            }
        }
    }
    report
}

pub struct SqliteSink {
    path: PathBuf,
    conn: Connection,
    retry: RetryPolicy,
}

impl BatchSink for SqliteSink {
    type Record = LogEntry;

    fn write_batch(&mut self, batch: &[LogEntry]) -> FlushReport {
        let tx = match self.conn.transaction() {
            Ok(tx) => tx,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, lost = batch.len(), "cannot begin http log transaction");
                return FlushReport::lost(batch.len());
            }
        };
        let mut report = write_rows(&tx, batch, &self.retry, insert_entry);
        if let Err(e) = tx.commit() {
            error!(path = %self.path.display(), error = %e, lost = report.written, "cannot commit http log batch");
            report.dropped += report.written;
            report.written = 0;
            report.failed = true;
        }
        report
    }

    fn close(self) -> Result<(), LogError> {
        self.conn.close().map_err(|(_, e)| LogError::Close {
            path: self.path,
            reason: e.to_string(),
        })
    }
}

fn db_err(path: &Path) -> impl FnOnce(rusqlite::Error) -> LogError + '_ {
    move |source| LogError::Database {
        path: path.to_path_buf(),
        source,
    }
}

/// Switch a new database to WAL and create the `loghttp` table, unless the
/// table already exists. Returns whether it was created.
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(TABLE_EXISTS, [], |row| row.get(0))?;
    if count > 0 {
        return Ok(false);
    }
    // In-memory databases answer "memory"; either mode is fine.
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.execute_batch(SCHEMA)?;
    Ok(true)
}

impl Logger<SqliteSink> {
    /// Open (or create) the database at `path`, create the `loghttp` table
    /// if missing and start flushing to it.
    pub fn open(path: impl AsRef<Path>, config: SqliteLoggerConfig) -> Result<Self, LogError> {
        let path = path.as_ref();
        prepare_parent(path)?;
        let conn = Connection::open(path).map_err(db_err(path))?;
        let claim = PathClaim::acquire(path)?;

        conn.busy_timeout(config.busy_timeout).map_err(db_err(path))?;
        conn.pragma_update(None, "foreign_keys", false)
            .map_err(db_err(path))?;
        if ensure_schema(&conn).map_err(db_err(path))? {
            info!(path = %path.display(), table = TABLE_NAME, "created http log table");
        }

        let sink = SqliteSink {
            path: claim.path().to_path_buf(),
            conn,
            retry: config.retry,
        };
        Logger::start(sink, claim, config.options)
    }
}
