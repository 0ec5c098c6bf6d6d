use crate::error::LogError;
use crate::sink::{BatchSink, FlushReport};
use std::io;
use std::sync::{Arc, Mutex};

/// Sink that appends every record to a shared vector.
pub struct MemorySink {
    written: Arc<Mutex<Vec<i32>>>,
}

impl MemorySink {
    pub fn new() -> (Self, Arc<Mutex<Vec<i32>>>) {
        let written = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                written: Arc::clone(&written),
            },
            written,
        )
    }
}

impl BatchSink for MemorySink {
    type Record = i32;

    fn write_batch(&mut self, batch: &[i32]) -> FlushReport {
        self.written.lock().unwrap().extend_from_slice(batch);
        FlushReport {
            written: batch.len(),
            ..FlushReport::default()
        }
    }

    fn close(self) -> Result<(), LogError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a subscriber that records every event, and return the text.
pub fn capture_logs(f: impl FnOnce()) -> String {
    let writer = CaptureWriter::default();
    let sink = writer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || sink.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    let bytes = writer.0.lock().unwrap().clone();
    String::from_utf8_lossy(&bytes).into_owned()
}
