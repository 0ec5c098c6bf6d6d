use crate::error::LogError;

/// What happened to one drained batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Records durably written.
    pub written: usize,
    /// Records refused before writing (no timestamp).
    pub rejected: usize,
    /// Records lost to write errors or exhausted retries.
    pub dropped: usize,
    /// Extra attempts made because the store was busy.
    pub busy_retries: u64,
    /// The batch as a whole could not be written (open, write or commit failed).
    pub failed: bool,
}

impl FlushReport {
    pub fn total(&self) -> usize {
        self.written + self.rejected + self.dropped
    }

    /// Report for a batch that was lost as a whole.
    pub fn lost(count: usize) -> Self {
        Self {
            dropped: count,
            failed: true,
            ..Self::default()
        }
    }
}

/// Durable target of a logger: performs one bulk write per flush.
///
/// Implementations own their resource exclusively; they are only ever called
/// from the flusher thread or from `close`, never from producers.
pub trait BatchSink: Send + 'static {
    type Record: Send + 'static;

    /// Write every record of `batch`, in order. Never fails as a whole:
    /// problems are logged and reflected in the report.
    fn write_batch(&mut self, batch: &[Self::Record]) -> FlushReport;

    /// Release the underlying resource.
    fn close(self) -> Result<(), LogError>;
}

/// Hook notified after every flush, e.g. to export counters.
pub trait FlushObserver: Send + Sync {
    fn on_flush(&self, report: &FlushReport);

    /// A record was appended after the logger closed and was discarded.
    fn on_refused(&self) {}
}
