use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures opening or closing a logger.
///
/// Per-entry write failures never surface here; they are logged and counted.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("log path is empty")]
    EmptyPath,

    #[error("log path {0} is already owned by another logger in this process")]
    PathInUse(PathBuf),

    #[error("cannot create log directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("cannot open log file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("cannot set up log database {path}: {source}")]
    Database {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("cannot close log {path}: {reason}")]
    Close { path: PathBuf, reason: String },

    #[error("flusher thread for {0} could not be started or panicked")]
    Flusher(PathBuf),
}
