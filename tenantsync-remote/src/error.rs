//! Error types for tenantsync-remote.

use std::time::Duration;

use thiserror::Error;

/// All errors that can arise from talking to the remote tenant API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport-level failure from `reqwest`.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The API answered with a non-success status.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// HTTP 429; `retry_after` carries the server's hint when present.
    #[error("rate limited by remote API")]
    RateLimited { retry_after: Option<Duration> },

    /// Pagination produced a result that cannot be trusted.
    #[error("data integrity error for {resource}: {message}")]
    Integrity { resource: String, message: String },

    /// A response body did not have the expected shape.
    #[error("unexpected response from {path}: {message}")]
    Decode { path: String, message: String },

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl RemoteError {
    /// Whether the pool should try the request again.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::RateLimited { .. } => true,
            RemoteError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
