//! Error types for loadforge

use thiserror::Error;

/// Invalid run configuration. Always fatal, raised before any virtual user starts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("virtual_users must be at least 1")]
    NoVirtualUsers,

    #[error("duration must be greater than zero")]
    ZeroDuration,

    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    #[error("target is required")]
    MissingTarget,

    #[error("malformed target URL '{url}': {reason}")]
    MalformedTarget { url: String, reason: String },

    #[error("unsupported URL scheme '{0}', expected http or https")]
    UnsupportedScheme(String),

    #[error("at least one check must be declared")]
    NoChecks,

    #[error("check name must not be empty")]
    EmptyCheckName,

    #[error("duplicate check name '{0}'")]
    DuplicateCheck(String),

    #[error("invalid header '{0}'")]
    InvalidHeader(String),

    #[error("check threshold must be within 0.0..=1.0, got {0}")]
    InvalidThreshold(f64),

    #[error("invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Failure of a single request. Recorded against the iteration's checks, never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("connection refused or host unreachable")]
    Connect,

    #[error("timeout")]
    Timeout,

    #[error("connection closed unexpectedly")]
    Closed,

    #[error("unknown network error: {0}")]
    Other(String),
}

impl NetworkError {
    /// Key used in the status breakdown of the run summary.
    pub fn status_key(&self) -> &'static str {
        match self {
            NetworkError::Connect => "CONNECT_ERROR",
            NetworkError::Timeout => "TIMEOUT",
            NetworkError::Closed => "CONNECTION_CLOSED",
            NetworkError::Other(_) => "REQUEST_ERROR",
        }
    }
}

impl From<hyper::Error> for NetworkError {
    fn from(e: hyper::Error) -> Self {
        if e.is_connect() {
            NetworkError::Connect
        } else if e.is_timeout() {
            NetworkError::Timeout
        } else if e.is_closed() || e.is_incomplete_message() {
            NetworkError::Closed
        } else {
            NetworkError::Other(e.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
