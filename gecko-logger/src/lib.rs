//! Buffered, append-only HTTP loggers.
//!
//! Request handlers call [`gecko_core::HttpLogger::save_log`], which only
//! appends to memory. A background thread per logger writes the buffer to a
//! flat file ([`FileLogger`]) or a SQLite database ([`SqliteLogger`]) in one
//! bulk operation per interval.

pub mod buffer;
pub mod error;
pub mod file;
pub mod logger;
#[cfg(feature = "prometheus")]
pub mod metrics;
pub mod registry;
pub mod retry;
pub mod sink;
pub mod sqlite;
pub mod stats;
pub mod writer;

#[cfg(test)]
mod test_support;

pub use error::LogError;
pub use file::{FileLogger, FileRecord, printable_query};
pub use logger::{LogHandle, Logger, LoggerOptions};
#[cfg(feature = "prometheus")]
pub use metrics::LogMetrics;
pub use retry::RetryPolicy;
pub use sink::{BatchSink, FlushObserver, FlushReport};
pub use sqlite::{SqliteLogger, SqliteLoggerConfig};
pub use stats::StatsSnapshot;
pub use writer::HttpLogWriter;
