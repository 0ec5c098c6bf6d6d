pub mod config;
pub mod entry;
pub mod error;

pub use config::GeckoConfig;
pub use entry::LogEntry;
pub use error::GeckoError;

/// Sink for completed HTTP transactions.
///
/// Called once per request from the serving path, so implementations must
/// return without waiting on storage.
pub trait HttpLogger: Send + Sync {
    fn save_log(&self, entry: LogEntry);
}

/// Prints each entry as a JSON line on stdout. Useful during development.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutLogger;

impl HttpLogger for StdoutLogger {
    fn save_log(&self, entry: LogEntry) {
        write_json_line(&mut std::io::stdout().lock(), &entry);
    }
}

fn write_json_line(out: &mut impl std::io::Write, entry: &LogEntry) {
    let result = serde_json::to_string(entry)
        .map_err(std::io::Error::from)
        .and_then(|line| writeln!(out, "{line}"));
    if let Err(e) = result {
        tracing::warn!(uri = %entry.uri, error = %e, "cannot print http log entry");
    }
}
