//! Process-wide single-writer claim on log paths.
//!
//! Two loggers flushing into the same file or database would interleave
//! batches with no defined order, so opening a path that is already owned
//! fails instead.

use crate::error::LogError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, PoisonError};

static OWNED_PATHS: LazyLock<Mutex<HashSet<PathBuf>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

/// Ownership of a log path; released on drop.
#[derive(Debug)]
pub struct PathClaim {
    path: PathBuf,
}

impl PathClaim {
    /// Claim `path`, which must already exist so it can be canonicalized.
    pub fn acquire(path: &Path) -> Result<Self, LogError> {
        let canonical = path.canonicalize().map_err(|source| LogError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut owned = OWNED_PATHS.lock().unwrap_or_else(PoisonError::into_inner);
        if !owned.insert(canonical.clone()) {
            return Err(LogError::PathInUse(canonical));
        }
        Ok(Self { path: canonical })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PathClaim {
    fn drop(&mut self) {
        OWNED_PATHS
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.path);
    }
}
