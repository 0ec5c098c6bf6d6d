// Gecko demo server: serves a handful of routes and records every request
// through the configured HTTP logger.

use anyhow::Context;
use clap::Parser;
use gecko_core::GeckoConfig;
use gecko_logger::{FlushObserver, HttpLogWriter, LogMetrics};
use gecko_server::{AppState, build_router, check_metrics_path};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "gecko", version, about = "Gecko, HTTP server with buffered request logging")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "gecko.yaml")]
    config: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Body returned by `/`
    #[arg(long, default_value = "Hello from gecko")]
    message: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Tracing ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "gecko starting");

    // ── Config ──
    let config = if cli.config.exists() {
        info!(path = %cli.config.display(), "Loading config file");
        GeckoConfig::load(&cli.config)?
    } else {
        info!("No config file found, using defaults");
        GeckoConfig::default()
    };

    // ── Metrics ──
    let prometheus = &config.observability.prometheus;
    let metrics = if prometheus.enabled {
        check_metrics_path(&prometheus.path)
            .with_context(|| format!("invalid metrics path '{}'", prometheus.path))?;
        Some(Arc::new(LogMetrics::new()?))
    } else {
        None
    };
    let observer = metrics
        .clone()
        .map(|m| m as Arc<dyn FlushObserver>);

    // ── HTTP log ──
    let writer = HttpLogWriter::from_config(&config.http_log, observer)
        .with_context(|| format!("cannot open http log at {}", config.http_log.path.display()))?;

    let state = AppState {
        message: Arc::from(cli.message.as_str()),
        metrics,
        metrics_path: prometheus.path.clone(),
    };
    let app = build_router(state, writer.producer());

    let listener = tokio::net::TcpListener::bind(&config.server.addr)
        .await
        .with_context(|| format!("cannot bind {}", config.server.addr))?;
    info!(addr = %config.server.addr, backend = ?config.http_log.backend, "gecko is ready");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Shutdown signal received, flushing http log");
    if let Some(stats) = writer.stats() {
        info!(
            accepted = stats.accepted,
            persisted = stats.persisted,
            rejected = stats.rejected,
            dropped = stats.dropped,
            "http log totals"
        );
    }
    // Joins the flusher thread and writes the last batch.
    if let Err(e) = tokio::task::spawn_blocking(move || writer.close()).await? {
        warn!(error = %e, "http log did not close cleanly");
    }

    info!("gecko stopped");
    Ok(())
}

/// SIGTERM (docker stop) + SIGINT (Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
