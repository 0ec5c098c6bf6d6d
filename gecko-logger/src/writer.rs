use crate::error::LogError;
use crate::file::FileLogger;
use crate::logger::LoggerOptions;
use crate::retry::RetryPolicy;
use crate::sink::FlushObserver;
use crate::sqlite::{SqliteLogger, SqliteLoggerConfig};
use crate::stats::StatsSnapshot;
use gecko_core::config::{HttpLogConfig, LogBackend};
use gecko_core::{HttpLogger, StdoutLogger};
use std::sync::Arc;
use tracing::info;

/// The HTTP logger selected by configuration.
pub enum HttpLogWriter {
    Disabled,
    Stdout,
    File(FileLogger),
    Sqlite(SqliteLogger),
}

impl HttpLogWriter {
    /// Open the configured backend. Failing to open is fatal to the caller:
    /// a server that cannot record its traffic should not start.
    pub fn from_config(
        config: &HttpLogConfig,
        observer: Option<Arc<dyn FlushObserver>>,
    ) -> Result<Self, LogError> {
        if !config.enabled {
            info!("http logging disabled");
            return Ok(HttpLogWriter::Disabled);
        }
        let options = LoggerOptions {
            flush_interval: config.flush_interval(),
            observer,
        };
        let writer = match config.backend {
            LogBackend::Stdout => HttpLogWriter::Stdout,
            LogBackend::File => HttpLogWriter::File(FileLogger::open(&config.path, options)?),
            LogBackend::Sqlite => HttpLogWriter::Sqlite(SqliteLogger::open(
                &config.path,
                SqliteLoggerConfig {
                    options,
                    busy_timeout: config.busy_timeout(),
                    retry: RetryPolicy {
                        max_retries: config.retry.max_retries,
                        delay: config.retry.delay(),
                    },
                },
            )?),
        };
        Ok(writer)
    }

    /// Producer to hand to request handlers; `None` when logging is disabled.
    pub fn producer(&self) -> Option<Arc<dyn HttpLogger>> {
        match self {
            HttpLogWriter::Disabled => None,
            HttpLogWriter::Stdout => Some(Arc::new(StdoutLogger)),
            HttpLogWriter::File(logger) => Some(Arc::new(logger.handle())),
            HttpLogWriter::Sqlite(logger) => Some(Arc::new(logger.handle())),
        }
    }

    pub fn stats(&self) -> Option<StatsSnapshot> {
        match self {
            HttpLogWriter::Disabled | HttpLogWriter::Stdout => None,
            HttpLogWriter::File(logger) => Some(logger.stats()),
            HttpLogWriter::Sqlite(logger) => Some(logger.stats()),
        }
    }

    /// Flush what is still buffered and release the backend.
    pub fn close(self) -> Result<(), LogError> {
        match self {
            HttpLogWriter::Disabled | HttpLogWriter::Stdout => Ok(()),
            HttpLogWriter::File(logger) => logger.close(),
            HttpLogWriter::Sqlite(logger) => logger.close(),
        }
    }
}
