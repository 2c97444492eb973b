//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Why a configuration could not be loaded
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file is not YAML matching the configuration schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A `VELOCITY_*` variable holds a value that does not parse
    #[error("Environment variable error: {0}")]
    Env(String),

    /// A domain rejected one of its values
    #[error("Invalid {domain} configuration: {message}")]
    Invalid { domain: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_culprit() {
        let err = ConfigError::Read {
            path: PathBuf::from("/etc/velocity.yaml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to read config file /etc/velocity.yaml: not found"
        );

        let err = ConfigError::Invalid {
            domain: "pipeline".to_string(),
            message: "ping_count must be positive".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid pipeline configuration: ping_count must be positive"
        );
    }
}
