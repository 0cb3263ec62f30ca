//! Client error types

use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server rejected the request with a machine-readable code
    #[error("API error {code}: {message}")]
    Api { code: String, message: String },

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The feed dropped events; cached ranges must be refetched
    #[error("Feed lagged: {0} events dropped")]
    FeedLagged(u64),

    /// The feed ended
    #[error("Feed closed")]
    FeedClosed,

    /// Client misconfiguration or misuse
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Whether this is a lag signal rather than a terminal failure
    ///
    /// The feed stream stays alive after a lag; callers refetch and keep
    /// consuming.
    pub fn is_lag(&self) -> bool {
        matches!(self, ClientError::FeedLagged(_))
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
