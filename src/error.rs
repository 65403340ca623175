use std::path::PathBuf;
use thiserror::Error;

const REFRESH_HINT: &str = "refresh your SSO session with `aws sso login`";

#[derive(Error, Debug)]
pub enum OverrideError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("SSO cache directory not found: {0}")]
    MissingCache(PathBuf),

    #[error("No SSO token file found in {0}; {REFRESH_HINT}")]
    NoTokenFile(PathBuf),

    #[error("SSO token file {path} is {size} bytes, larger than the {limit} byte limit")]
    TokenTooLarge {
        path: PathBuf,
        size: u64,
        limit: u64,
    },

    #[error("Malformed SSO token: {0}; {REFRESH_HINT}")]
    MalformedToken(String),

    #[error("SSO session expired at {0}; {REFRESH_HINT}")]
    SessionExpired(String),

    #[error("Authentication failed: {0}; {REFRESH_HINT}")]
    AuthenticationFailed(String),

    #[error("{operation} still throttled after {attempts} attempts: {message}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: usize,
        message: String,
    },

    #[error("{operation} failed: {message}")]
    Remote {
        operation: &'static str,
        message: String,
    },

    #[error("Terraform workspace error: {0}")]
    Terraform(String),

    #[error("Harvest task failed: {0}")]
    TaskFailed(String),

    #[error("Harvest cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Coarse classification of failures, used to decide what may be retried,
/// skipped or reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Authentication,
    Throttling,
    Remote,
    Cancelled,
    Io,
}

impl OverrideError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OverrideError::ConfigError(_)
            | OverrideError::MissingCache(_)
            | OverrideError::Terraform(_)
            | OverrideError::Toml(_) => ErrorKind::Configuration,
            OverrideError::NoTokenFile(_)
            | OverrideError::TokenTooLarge { .. }
            | OverrideError::MalformedToken(_)
            | OverrideError::SessionExpired(_)
            | OverrideError::AuthenticationFailed(_) => ErrorKind::Authentication,
            // Throttling never escapes the gateway; once retries run out it is a remote failure.
            OverrideError::RetriesExhausted { .. }
            | OverrideError::Remote { .. }
            | OverrideError::TaskFailed(_) => ErrorKind::Remote,
            OverrideError::Cancelled => ErrorKind::Cancelled,
            OverrideError::Io(_) | OverrideError::Json(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, OverrideError>;
