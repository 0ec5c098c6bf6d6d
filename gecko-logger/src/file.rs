//! Flat-file backend: one JSON object per line, appended to a single file.
//!
//! Each flush serializes the whole batch into one buffer and issues a single
//! `write_all`, so a busy server costs one I/O operation per interval rather
//! than one per request. The file is never rotated or truncated.

use crate::error::LogError;
use crate::logger::{LogHandle, Logger, LoggerOptions};
use crate::registry::PathClaim;
use crate::sink::{BatchSink, FlushReport};
use chrono::Local;
use gecko_core::LogEntry;
use std::fmt::{Display, Write as _};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Buffered logger writing JSON lines to a file.
pub type FileLogger = Logger<FileSink>;

/// One buffered line of a [`FileLogger`].
#[derive(Debug, Clone, PartialEq)]
pub enum FileRecord {
    /// Serialized as JSON when flushed.
    Entry(LogEntry),
    /// Written verbatim.
    Line(String),
}

impl From<LogEntry> for FileRecord {
    fn from(entry: LogEntry) -> Self {
        FileRecord::Entry(entry)
    }
}

/// Free-form line prefixed with the local time, e.g. `2025-01-15 10:04:05 text`.
fn stamped_line(text: &str) -> FileRecord {
    FileRecord::Line(format!("{} {}", Local::now().format("%Y-%m-%d %H:%M:%S"), text))
}

/// `[QUERY] ` line with each `?` replaced by its argument in order.
///
/// When placeholders and arguments disagree the query is kept as is and the
/// counts and arguments are appended: `[QUERY] select ? PH:1 ARGS:2 {7, 9}`.
pub fn printable_query(sql: &str, args: &[&dyn Display]) -> String {
    let placeholders = sql.matches('?').count();
    let mut out = String::from("[QUERY] ");
    if placeholders == args.len() {
        let mut args = args.iter();
        for (i, part) in sql.split('?').enumerate() {
            if i > 0
                && let Some(arg) = args.next()
            {
                let _ = write!(out, "{arg}");
            }
            out.push_str(part);
        }
    } else {
        let _ = write!(out, "{sql} PH:{placeholders} ARGS:{} {{", args.len());
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{arg}");
        }
        out.push('}');
    }
    out
}

pub struct FileSink {
    path: PathBuf,
    file: File,
    /// A failed write may have left a partial line at the end of the file.
    torn: bool,
}

impl BatchSink for FileSink {
    type Record = FileRecord;

    fn write_batch(&mut self, batch: &[FileRecord]) -> FlushReport {
        let mut report = FlushReport::default();
        let mut out = String::new();
        let mut lines = 0;

        for record in batch {
            match record {
                FileRecord::Entry(entry) if !entry.has_timestamp() => {
                    warn!(
                        path = %self.path.display(),
                        uri = %entry.uri,
                        "http log entry without timestamp, not persisted"
                    );
                    report.rejected += 1;
                }
                FileRecord::Entry(entry) => match serde_json::to_string(entry) {
                    Ok(json) => {
                        out.push_str(&json);
                        out.push('\n');
                        lines += 1;
                    }
                    Err(e) => {
                        warn!(path = %self.path.display(), error = %e, "cannot serialize http log entry");
                        report.dropped += 1;
                    }
                },
                FileRecord::Line(text) => {
                    out.push_str(text.strip_suffix('\n').unwrap_or(text));
                    out.push('\n');
                    lines += 1;
                }
            }
        }

        if lines == 0 {
            return report;
        }
        if self.torn {
            out.insert(0, '\n');
        }
        match self.file.write_all(out.as_bytes()) {
            Ok(()) => {
                self.torn = false;
                report.written = lines;
            }
            Err(e) => {
                self.torn = true;
                // Not through the logger itself: it is what just failed.
                error!(path = %self.path.display(), error = %e, lost = lines, "failed to write http log batch");
                report.dropped += lines;
                report.failed = true;
            }
        }
        report
    }

    fn close(self) -> Result<(), LogError> {
        // Last chance for the OS to report a failed write.
        self.file.sync_all().map_err(|e| LogError::Close {
            path: self.path,
            reason: e.to_string(),
        })
    }
}

/// Reject empty paths and create the parent directory if missing.
pub(crate) fn prepare_parent(path: &Path) -> Result<(), LogError> {
    if path.as_os_str().is_empty() {
        return Err(LogError::EmptyPath);
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|source| LogError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
        info!(dir = %parent.display(), "created http log directory");
    }
    Ok(())
}

fn open_append(path: &Path) -> Result<File, LogError> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o640);
    }
    options.open(path).map_err(|source| LogError::Open {
        path: path.to_path_buf(),
        source,
    })
}

impl Logger<FileSink> {
    /// Open (or create) `path` in append mode and start flushing to it.
    pub fn open(path: impl AsRef<Path>, options: LoggerOptions) -> Result<Self, LogError> {
        let path = path.as_ref();
        prepare_parent(path)?;
        let file = open_append(path)?;
        let claim = PathClaim::acquire(path)?;
        let sink = FileSink {
            path: claim.path().to_path_buf(),
            file,
            torn: false,
        };
        Logger::start(sink, claim, options)
    }

    /// Buffer a free-form text line, stamped with the local time.
    pub fn log_line(&self, text: &str) {
        self.push(stamped_line(text));
    }

    /// Buffer a SQL statement with its arguments, see [`printable_query`].
    pub fn log_query(&self, sql: &str, args: &[&dyn Display]) {
        self.push(stamped_line(&printable_query(sql, args)));
    }
}

impl LogHandle<FileSink> {
    /// Buffer a free-form text line, stamped with the local time.
    pub fn log_line(&self, text: &str) {
        self.push(stamped_line(text));
    }

    pub fn log_query(&self, sql: &str, args: &[&dyn Display]) {
        self.push(stamped_line(&printable_query(sql, args)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::capture_logs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn entry(uri: &str) -> LogEntry {
        LogEntry {
            uri: uri.to_string(),
            status: 200,
            ..LogEntry::now()
        }
    }

    fn slow() -> LoggerOptions {
        LoggerOptions {
            flush_interval: Duration::from_secs(60),
            ..LoggerOptions::default()
        }
    }

    #[test]
    fn open_creates_directories_and_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deep").join("nested").join("http.log");
        let logger = FileLogger::open(&path, slow()).unwrap();
        assert!(path.exists());
        logger.close().unwrap();
    }

    #[test]
    fn empty_path_is_rejected() {
        assert!(matches!(FileLogger::open("", slow()), Err(LogError::EmptyPath)));
    }

    #[test]
    fn entries_are_written_as_json_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("http.log");
        let logger = FileLogger::open(&path, slow()).unwrap();
        logger.push(entry("/a").into());
        logger.push(entry("/b?x=1").into());
        logger.close().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.ends_with('\n'));
        let uris: Vec<String> = content
            .lines()
            .map(|l| serde_json::from_str::<LogEntry>(l).unwrap().uri)
            .collect();
        assert_eq!(uris, vec!["/a", "/b?x=1"]);
    }

    #[test]
    fn reopening_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("http.log");
        for uri in ["/first", "/second"] {
            let logger = FileLogger::open(&path, slow()).unwrap();
            logger.push(entry(uri).into());
            logger.close().unwrap();
        }
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn text_lines_are_stamped_and_newline_terminated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let logger = FileLogger::open(&path, slow()).unwrap();
        logger.log_line("server started\n");
        logger.handle().log_line("ready");
        logger.close().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" server started"));
        assert!(lines[1].ends_with(" ready"));
        // "YYYY-MM-DD HH:MM:SS " prefix
        assert_eq!(lines[0].len(), "2025-01-15 10:04:05 server started".len());
    }

    #[test]
    fn entry_without_timestamp_is_rejected_and_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("http.log");
        let mut stats = None;
        let logs = capture_logs(|| {
            let logger = FileLogger::open(&path, slow()).unwrap();
            logger.push(FileRecord::Entry(LogEntry {
                uri: "/no-time".into(),
                ..LogEntry::default()
            }));
            logger.push(entry("/ok").into());
            logger.flush();
            stats = Some(logger.stats());
            logger.close().unwrap();
        });

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("/ok"));
        assert!(logs.contains("without timestamp"));
        assert!(logs.contains("/no-time"));
        let stats = stats.unwrap();
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.persisted, 1);
    }

    #[test]
    fn query_placeholders_are_filled_in_order() {
        let line = printable_query(
            "SELECT * FROM items WHERE id = ? AND owner = ?",
            &[&42, &"ana"],
        );
        assert_eq!(line, "[QUERY] SELECT * FROM items WHERE id = 42 AND owner = ana");
        assert_eq!(printable_query("SELECT 1", &[]), "[QUERY] SELECT 1");
    }

    #[test]
    fn query_with_wrong_argument_count_lists_them() {
        assert_eq!(
            printable_query("DELETE FROM items WHERE id = ?", &[&7, &9]),
            "[QUERY] DELETE FROM items WHERE id = ? PH:1 ARGS:2 {7, 9}"
        );
        assert_eq!(
            printable_query("UPDATE items SET a = ?, b = ?", &[]),
            "[QUERY] UPDATE items SET a = ?, b = ? PH:2 ARGS:0 {}"
        );
    }

    #[test]
    fn queries_are_buffered_as_stamped_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sql.log");
        let logger = FileLogger::open(&path, slow()).unwrap();
        logger.log_query("SELECT name FROM users WHERE id = ?", &[&3]);
        logger.handle().log_query("SELECT ?", &[]);
        logger.close().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" [QUERY] SELECT name FROM users WHERE id = 3"));
        assert!(lines[1].ends_with(" [QUERY] SELECT ? PH:1 ARGS:0 {}"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn batch_after_failed_write_starts_on_a_new_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("http.log");
        fs::write(&path, "{\"uri\":\"/cut").unwrap();
        // Writes to /dev/full always fail with ENOSPC.
        let full = OpenOptions::new().append(true).open("/dev/full").unwrap();
        let mut sink = FileSink {
            path: path.clone(),
            file: full,
            torn: false,
        };
        let report = sink.write_batch(&[entry("/lost").into()]);
        assert!(report.failed);
        assert_eq!(report.dropped, 1);
        assert!(sink.torn);

        sink.file = open_append(&path).unwrap();
        let report = sink.write_batch(&[entry("/next").into()]);
        assert_eq!(report.written, 1);
        assert!(!sink.torn);

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "{\"uri\":\"/cut");
        assert_eq!(serde_json::from_str::<LogEntry>(lines[1]).unwrap().uri, "/next");
    }

    #[test]
    fn second_logger_on_same_file_is_refused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("http.log");
        let first = FileLogger::open(&path, slow()).unwrap();
        assert!(matches!(
            FileLogger::open(&path, slow()),
            Err(LogError::PathInUse(_))
        ));
        first.close().unwrap();
        FileLogger::open(&path, slow()).unwrap().close().unwrap();
    }
}
