//! Client error types.

/// REST client errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// Failed to deserialize response.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// API returned an error response.
    #[error("API error [{code}]: {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
    },

    /// Rate limited (429).
    #[error("rate limited{}", .retry_after.map(|secs| format!(", retry after {secs} seconds")).unwrap_or_default())]
    RateLimited {
        /// Retry after seconds.
        retry_after: Option<u64>,
    },

    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing or expired credentials (401).
    #[error("unauthorized")]
    Unauthorized,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Request timeout.
    #[error("request timeout")]
    Timeout,
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(err)
        }
    }
}
