use crate::sink::{FlushObserver, FlushReport};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Exports flush outcomes as prometheus counters.
///
/// Register it through `LoggerOptions::observer`; `render` produces the text
/// exposition for a `/metrics` endpoint.
pub struct LogMetrics {
    registry: Registry,
    pub entries_total: IntCounterVec,
    pub flushes_total: IntCounterVec,
    pub batch_size: HistogramVec,
}

impl LogMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let entries_total = IntCounterVec::new(
            Opts::new("httplog_entries_total", "HTTP log entries by outcome").namespace("gecko"),
            &["outcome"],
        )?;
        let flushes_total = IntCounterVec::new(
            Opts::new("httplog_flushes_total", "HTTP log flushes by result").namespace("gecko"),
            &["result"],
        )?;
        let batch_size = HistogramVec::new(
            HistogramOpts::new("httplog_batch_size", "Entries drained per flush")
                .namespace("gecko")
                .buckets(vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0]),
            &["result"],
        )?;

        registry.register(Box::new(entries_total.clone()))?;
        registry.register(Box::new(flushes_total.clone()))?;
        registry.register(Box::new(batch_size.clone()))?;

        Ok(Self {
            registry,
            entries_total,
            flushes_total,
            batch_size,
        })
    }

    /// Render prometheus text exposition format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or(());
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl FlushObserver for LogMetrics {
    fn on_flush(&self, report: &FlushReport) {
        let result = if report.failed { "failed" } else { "ok" };
        self.flushes_total.with_label_values(&[result]).inc();
        self.batch_size
            .with_label_values(&[result])
            .observe(report.total() as f64);

        for (outcome, n) in [
            ("written", report.written as u64),
            ("rejected", report.rejected as u64),
            ("dropped", report.dropped as u64),
            ("busy_retry", report.busy_retries),
        ] {
            if n > 0 {
                self.entries_total.with_label_values(&[outcome]).inc_by(n);
            }
        }
    }

    fn on_refused(&self) {
        self.entries_total.with_label_values(&["refused"]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_outcomes_are_counted() {
        let m = LogMetrics::new().unwrap();
        m.on_flush(&FlushReport {
            written: 9,
            rejected: 1,
            busy_retries: 2,
            ..FlushReport::default()
        });
        m.on_flush(&FlushReport::lost(4));
        m.on_refused();

        let entries = |o: &str| m.entries_total.with_label_values(&[o]).get();
        assert_eq!(entries("written"), 9);
        assert_eq!(entries("rejected"), 1);
        assert_eq!(entries("busy_retry"), 2);
        assert_eq!(entries("dropped"), 4);
        assert_eq!(entries("refused"), 1);
        assert_eq!(m.flushes_total.with_label_values(&["ok"]).get(), 1);
        assert_eq!(m.flushes_total.with_label_values(&["failed"]).get(), 1);
    }

    #[test]
    fn render_returns_prometheus_text() {
        let m = LogMetrics::new().unwrap();
        m.on_flush(&FlushReport {
            written: 3,
            ..FlushReport::default()
        });
        let output = m.render();
        assert!(output.contains("gecko_httplog_entries_total"));
        assert!(output.contains("gecko_httplog_flushes_total"));
        assert!(output.contains("gecko_httplog_batch_size"));
    }
}
