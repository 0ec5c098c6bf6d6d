use crate::sink::FlushReport;
use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters of one logger.
///
/// `dropped` is the figure to watch: it counts records that were accepted
/// but never reached storage.
#[derive(Debug, Default)]
pub struct LogStats {
    accepted: AtomicU64,
    persisted: AtomicU64,
    rejected: AtomicU64,
    dropped: AtomicU64,
    busy_retries: AtomicU64,
    flushes: AtomicU64,
    failed_flushes: AtomicU64,
}

/// Point-in-time copy of [`LogStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub accepted: u64,
    pub persisted: u64,
    pub rejected: u64,
    pub dropped: u64,
    pub busy_retries: u64,
    pub flushes: u64,
    pub failed_flushes: u64,
}

impl LogStats {
    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_refused(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self, report: &FlushReport) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.persisted.fetch_add(report.written as u64, Ordering::Relaxed);
        self.rejected.fetch_add(report.rejected as u64, Ordering::Relaxed);
        self.dropped.fetch_add(report.dropped as u64, Ordering::Relaxed);
        self.busy_retries.fetch_add(report.busy_retries, Ordering::Relaxed);
        if report.failed {
            self.failed_flushes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            busy_retries: self.busy_retries.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            failed_flushes: self.failed_flushes.load(Ordering::Relaxed),
        }
    }
}
