//! Buffered logger lifecycle shared by every backend.
//!
//! Producers append to an in-memory [`EntryBuffer`] and return immediately.
//! A dedicated `gecko-flush` thread wakes on a fixed interval, swaps the
//! buffer out and hands the batch to the backend's [`BatchSink`]. `close`
//! stops the thread, seals the buffer, performs a last flush and releases the
//! resource.
//!
//! ```text
//!  producers ──push──▶ EntryBuffer ──swap (tick)──▶ BatchSink ──▶ file / sqlite
//! ```

use crate::buffer::{EntryBuffer, INITIAL_CAPACITY, recycle};
use crate::error::LogError;
use crate::registry::PathClaim;
use crate::sink::{BatchSink, FlushObserver, FlushReport};
use crate::stats::{LogStats, StatsSnapshot};
use crossbeam_channel::{Receiver, Sender};
use gecko_core::{HttpLogger, LogEntry};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Shortest accepted flush interval.
pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Raise `requested` to [`MIN_FLUSH_INTERVAL`] if it is shorter.
pub fn clamp_interval(requested: Duration) -> Duration {
    requested.max(MIN_FLUSH_INTERVAL)
}

/// Settings common to every backend.
#[derive(Clone)]
pub struct LoggerOptions {
    pub flush_interval: Duration,
    pub observer: Option<Arc<dyn FlushObserver>>,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(3),
            observer: None,
        }
    }
}

impl std::fmt::Debug for LoggerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerOptions")
            .field("flush_interval", &self.flush_interval)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

struct Shared<S: BatchSink> {
    path: PathBuf,
    buffer: EntryBuffer<S::Record>,
    writer: Mutex<Writer<S>>,
    stats: LogStats,
    observer: Option<Arc<dyn FlushObserver>>,
    warned_closed: AtomicBool,
}

struct Writer<S: BatchSink> {
    sink: Option<S>,
    spare: Vec<S::Record>,
}

impl<S: BatchSink> Shared<S> {
    fn push(&self, record: S::Record) {
        match self.buffer.push(record) {
            Ok(()) => self.stats.record_accepted(),
            Err(_) => {
                self.stats.record_refused();
                if let Some(observer) = &self.observer {
                    observer.on_refused();
                }
                if !self.warned_closed.swap(true, Ordering::Relaxed) {
                    warn!(path = %self.path.display(), "http logger is closed, discarding entries");
                }
            }
        }
    }

    /// Move everything buffered to the sink. Serialized by the writer lock,
    /// so a tick and `close` never write concurrently.
    fn flush(&self) -> Option<FlushReport> {
        if self.buffer.is_empty() {
            return None;
        }
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let Writer { sink, spare } = &mut *writer;
        let sink = sink.as_mut()?;

        self.buffer.swap_into(spare);
        if spare.is_empty() {
            return None;
        }
        let report = sink.write_batch(spare);
        recycle(spare);

        self.stats.record_flush(&report);
        if let Some(observer) = &self.observer {
            observer.on_flush(&report);
        }
        debug!(
            path = %self.path.display(),
            written = report.written,
            rejected = report.rejected,
            dropped = report.dropped,
            "http log flushed"
        );
        Some(report)
    }
}

fn run_flusher<S: BatchSink>(shared: &Shared<S>, interval: Duration, shutdown: &Receiver<()>) {
    let ticker = crossbeam_channel::tick(interval);
    loop {
        crossbeam_channel::select! {
            recv(ticker) -> _ => {
                shared.flush();
            }
            // Only ever disconnected, never sent to.
            recv(shutdown) -> _ => break,
        }
    }
}

/// Owner of a buffered logger: controls the flusher thread and the backing
/// resource. Producers should use [`Logger::handle`].
///
/// `close` must be called for the last buffered entries to reach storage;
/// dropping an unclosed logger does the same but can only log failures.
pub struct Logger<S: BatchSink> {
    shared: Arc<Shared<S>>,
    interval: Duration,
    shutdown: Option<Sender<()>>,
    flusher: Option<JoinHandle<()>>,
    claim: Option<PathClaim>,
}

impl<S: BatchSink> Logger<S> {
    /// Start flushing `sink` every `options.flush_interval` (clamped).
    pub(crate) fn start(sink: S, claim: PathClaim, options: LoggerOptions) -> Result<Self, LogError> {
        let interval = clamp_interval(options.flush_interval);
        let path = claim.path().to_path_buf();
        let shared = Arc::new(Shared {
            path: path.clone(),
            buffer: EntryBuffer::new(),
            writer: Mutex::new(Writer {
                sink: Some(sink),
                spare: Vec::with_capacity(INITIAL_CAPACITY),
            }),
            stats: LogStats::default(),
            observer: options.observer,
            warned_closed: AtomicBool::new(false),
        });

        // The flusher reports through whatever subscriber the caller had.
        let dispatch = tracing::dispatcher::get_default(|d| d.clone());
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let worker = Arc::clone(&shared);
        let flusher = std::thread::Builder::new()
            .name("gecko-flush".to_string())
            .spawn(move || {
                tracing::dispatcher::with_default(&dispatch, || {
                    run_flusher(&worker, interval, &shutdown_rx)
                })
            })
            .map_err(|_| LogError::Flusher(path.clone()))?;

        info!(path = %path.display(), interval_ms = interval.as_millis() as u64, "http logger started");

        Ok(Self {
            shared,
            interval,
            shutdown: Some(shutdown_tx),
            flusher: Some(flusher),
            claim: Some(claim),
        })
    }

    /// Cheap, cloneable producer handle.
    pub fn handle(&self) -> LogHandle<S> {
        LogHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Append a record. Never blocks on storage.
    pub fn push(&self, record: S::Record) {
        self.shared.push(record);
    }

    /// Write everything buffered now, on the calling thread.
    pub fn flush(&self) -> Option<FlushReport> {
        self.shared.flush()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Effective flush interval, after clamping.
    pub fn flush_interval(&self) -> Duration {
        self.interval
    }

    /// Canonical path of the backing file or database.
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Records accepted but not yet flushed.
    pub fn pending(&self) -> usize {
        self.shared.buffer.len()
    }

    /// Stop the flusher, write the remaining entries and release the resource.
    ///
    /// The final write runs on the calling thread with no deadline. A sink
    /// stuck in I/O (hung network mount, locked database past its busy
    /// timeout) keeps `close` and therefore process exit waiting for it.
    pub fn close(mut self) -> Result<(), LogError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), LogError> {
        let Some(flusher) = self.flusher.take() else {
            return Ok(());
        };
        drop(self.shutdown.take());
        let joined = flusher.join();

        self.shared.buffer.seal();
        self.shared.flush();

        let sink = self
            .shared
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sink
            .take();
        let result = sink.map_or(Ok(()), |sink| sink.close());
        self.claim.take();

        if joined.is_err() {
            error!(path = %self.shared.path.display(), "http log flusher panicked");
            result?;
            return Err(LogError::Flusher(self.shared.path.clone()));
        }
        let stats = self.shared.stats.snapshot();
        info!(
            path = %self.shared.path.display(),
            persisted = stats.persisted,
            dropped = stats.dropped,
            "http logger closed"
        );
        result
    }
}

impl<S: BatchSink> Drop for Logger<S> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!(error = %e, "http logger shutdown failed");
        }
    }
}

impl<S> HttpLogger for Logger<S>
where
    S: BatchSink,
    S::Record: From<LogEntry>,
{
    fn save_log(&self, entry: LogEntry) {
        self.push(entry.into());
    }
}

/// Producer side of a [`Logger`]. Appends only; outliving the logger is
/// harmless, later appends are counted as dropped.
pub struct LogHandle<S: BatchSink> {
    shared: Arc<Shared<S>>,
}

impl<S: BatchSink> Clone for LogHandle<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: BatchSink> LogHandle<S> {
    pub fn push(&self, record: S::Record) {
        self.shared.push(record);
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl<S> HttpLogger for LogHandle<S>
where
    S: BatchSink,
    S::Record: From<LogEntry>,
{
    fn save_log(&self, entry: LogEntry) {
        self.push(entry.into());
    }
}
