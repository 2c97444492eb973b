//! HTTP error types

use crate::types::HttpMethodError;
use std::time::Duration;

/// Error type for HTTP operations
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Network error: {0}")]
    NetworkError(#[source] reqwest::Error),

    #[error("Request to {url} timed out after {}ms", .timeout.as_millis())]
    Timeout { url: String, timeout: Duration },

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(#[from] HttpMethodError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("No mock response for {method} {url}")]
    NoMock { method: String, url: String },

    #[error("Mocked failure: {0}")]
    MockFailure(String),
}

impl HttpError {
    /// Classify a reqwest error, keeping timeouts distinguishable
    pub(crate) fn from_reqwest(error: reqwest::Error, url: &str, timeout: Duration) -> Self {
        if error.is_timeout() {
            HttpError::Timeout {
                url: url.to_string(),
                timeout,
            }
        } else if error.is_builder() {
            HttpError::InvalidUrl(format!("{}: {}", url, error))
        } else {
            HttpError::NetworkError(error)
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpError::Timeout { .. })
    }
}
