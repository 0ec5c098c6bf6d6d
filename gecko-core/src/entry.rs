use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Number of leading characters of a session id kept in the log.
pub const SESSION_PREFIX_LEN: usize = 6;

/// One observed HTTP transaction, as stored in the `loghttp` table or as a
/// JSON line in a log file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the request started. Entries without a timestamp are never persisted.
    pub timestamp: Option<DateTime<Utc>>,
    pub host: String,
    pub method: String,
    /// Route pattern the request was dispatched on (column `ruta`).
    pub route: String,
    /// Path with query string.
    pub uri: String,
    /// Request was issued by htmx (`HX-Request: true`).
    pub htmx: bool,
    pub status: u16,
    /// Time spent processing and sending the response.
    #[serde(with = "duration_nanos")]
    pub latency: Duration,
    /// Request `Content-Length`.
    pub bytes_in: u64,
    /// Bytes written as response body.
    pub bytes_out: u64,
    pub error: Option<String>,
    pub remote_ip: String,
    /// Truncated session id, see [`LogEntry::set_session`].
    pub session: Option<String>,
    pub user_agent: String,
    pub referer: String,
    pub hx_current_url: String,
    pub hx_target: String,
    pub hx_trigger: String,
    pub hx_boosted: bool,
}

impl LogEntry {
    /// Entry stamped with the current time; fill the rest before saving.
    pub fn now() -> Self {
        Self {
            timestamp: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn has_timestamp(&self) -> bool {
        self.timestamp.is_some()
    }

    /// Record enough of the session id to tell users apart without exposing it.
    ///
    /// Only the first [`SESSION_PREFIX_LEN`] characters are kept. Ids that are
    /// not longer than that are not recorded at all.
    pub fn set_session(&mut self, session_id: &str) {
        if session_id.chars().count() > SESSION_PREFIX_LEN {
            self.session = Some(session_id.chars().take(SESSION_PREFIX_LEN).collect());
        } else {
            self.session = None;
        }
    }

    /// Latency in nanoseconds, saturating at `i64::MAX`.
    pub fn latency_nanos(&self) -> i64 {
        i64::try_from(self.latency.as_nanos()).unwrap_or(i64::MAX)
    }
}

mod duration_nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_nanos(u64::deserialize(d)?))
    }
}
