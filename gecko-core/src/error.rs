use thiserror::Error;

/// Unified error type for Gecko handlers.
#[derive(Error, Debug)]
pub enum GeckoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Has dependent records: {0}")]
    HasDependents(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Too big: {0}")]
    TooBig(String),

    #[error("Too long: {0}")]
    TooLong(String),

    #[error("Missing data: {0}")]
    MissingData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("No space left: {0}")]
    NoSpaceLeft(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Internal: {0}")]
    Internal(String),
}

impl GeckoError {
    /// Map to HTTP status code.
    pub fn status_code(&self) -> u16 {
        match self {
            GeckoError::NotFound(_) => 404,
            GeckoError::AlreadyExists(_) | GeckoError::HasDependents(_) => 409,
            GeckoError::TooManyRequests => 429,
            GeckoError::TooBig(_)
            | GeckoError::TooLong(_)
            | GeckoError::MissingData(_)
            | GeckoError::InvalidData(_) => 400,
            GeckoError::Unsupported(_) => 415,
            GeckoError::Unauthorized(_) => 403,
            GeckoError::Timeout(_) => 408,
            GeckoError::Unavailable(_) | GeckoError::WriteFailed(_) | GeckoError::ReadFailed(_) => {
                503
            }
            GeckoError::NoSpaceLeft(_) => 507,
            GeckoError::Io(_) | GeckoError::Serde(_) | GeckoError::Internal(_) => 500,
        }
    }

    /// JSON error body.
    pub fn to_json_body(&self) -> Vec<u8> {
        serde_json::json!({
            "error": self.to_string(),
            "status": self.status_code(),
        })
        .to_string()
        .into_bytes()
    }
}
