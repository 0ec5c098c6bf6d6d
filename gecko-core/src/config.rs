use figment::{Figment, providers::{Env, Format, Yaml}};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeckoConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub http_log: HttpLogConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
}

/// Where and how often completed requests are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpLogConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub backend: LogBackend,
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
    /// Values below one second are raised to one second by the logger.
    #[serde(default = "default_flush_interval")]
    pub flush_interval_ms: u64,
    /// SQLite only: how long the engine itself waits on a lock.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogBackend {
    /// One JSON object per line, appended to a single file.
    File,
    /// One row per request in the `loghttp` table.
    #[default]
    Sqlite,
    /// JSON lines on stdout, unbuffered. For development.
    Stdout,
}

/// Bounded retry for inserts that hit a busy/locked database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub delay_ms: u64,
}

/// Observability settings, disabled by default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// ── Defaults ──────────────────────────────────────────────────

fn default_addr() -> String { "0.0.0.0:8080".into() }
fn default_true() -> bool { true }
fn default_log_path() -> PathBuf { PathBuf::from("data/httplog.sqlite") }
fn default_flush_interval() -> u64 { 3000 }
fn default_busy_timeout() -> u64 { 1000 }
fn default_max_retries() -> u32 { 8 }
fn default_retry_delay() -> u64 { 120 }
fn default_metrics_path() -> String { "/metrics".into() }

// ── Impls ─────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self { addr: default_addr() }
    }
}

impl Default for HttpLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: LogBackend::default(),
            path: default_log_path(),
            flush_interval_ms: default_flush_interval(),
            busy_timeout_ms: default_busy_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay_ms: default_retry_delay(),
        }
    }
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_metrics_path(),
        }
    }
}

impl HttpLogConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl GeckoConfig {
    /// Load configuration from YAML file + env overrides.
    ///
    /// Environment keys use `__` between sections, e.g.
    /// `GECKO_HTTP_LOG__BACKEND=file`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config: GeckoConfig = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("GECKO_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the server cannot start with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let prometheus = &self.observability.prometheus;
        if prometheus.enabled {
            check_route_path(&prometheus.path)
                .map_err(|e| anyhow::anyhow!("observability.prometheus.path: {e}"))?;
        }
        Ok(())
    }
}

/// A static route: leading `/`, no `{param}` captures or `*` wildcards.
pub fn check_route_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("must not be empty".into());
    }
    if !path.starts_with('/') {
        return Err(format!("'{path}' must start with '/'"));
    }
    if path.contains(['{', '}', '*']) {
        return Err(format!("'{path}' must not contain captures or wildcards"));
    }
    Ok(())
}
