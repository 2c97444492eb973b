//! Probe error types

use std::time::Duration;

/// Failure of one strategy, or of a whole chain
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProbeError {
    /// A strategy returned an error
    #[error("Probe against {url} failed: {message}")]
    Failed { url: String, message: String },

    /// A strategy did not finish within the attempt timeout
    #[error("Probe against {url} timed out after {}ms", .timeout.as_millis())]
    Timeout { url: String, timeout: Duration },

    /// Every strategy failed and no synthesizer is configured
    #[error("All {attempts} probe strategies failed{}", last_error_suffix(.last))]
    Exhausted {
        attempts: usize,
        last: Option<String>,
    },
}

fn last_error_suffix(last: &Option<String>) -> String {
    match last {
        Some(last) => format!(", last error: {}", last),
        None => String::new(),
    }
}

impl ProbeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProbeError::Timeout { .. })
    }

    /// Endpoint the failure belongs to, if any
    pub fn url(&self) -> Option<&str> {
        match self {
            ProbeError::Failed { url, .. } | ProbeError::Timeout { url, .. } => Some(url),
            ProbeError::Exhausted { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_message() {
        let err = ProbeError::Exhausted {
            attempts: 2,
            last: Some("connection refused".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "All 2 probe strategies failed, last error: connection refused"
        );

        let err = ProbeError::Exhausted {
            attempts: 0,
            last: None,
        };
        assert_eq!(err.to_string(), "All 0 probe strategies failed");
    }

    #[test]
    fn test_timeout_message() {
        let err = ProbeError::Timeout {
            url: "https://a.example.net/ping".to_string(),
            timeout: Duration::from_millis(1500),
        };
        assert!(err.is_timeout());
        assert_eq!(err.url(), Some("https://a.example.net/ping"));
        assert!(err.to_string().ends_with("1500ms"));
    }
}
