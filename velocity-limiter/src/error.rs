//! History store errors

use thiserror::Error;
use velocity_core::SpeedtestError;

/// Result type for history operations
pub type HistoryResult<T> = Result<T, HistoryError>;

/// History store errors
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("History I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("History serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No location available for the history file")]
    NoStorageLocation,

    #[error("History kept changing while recording a run start")]
    Contended,
}

impl From<HistoryError> for SpeedtestError {
    fn from(error: HistoryError) -> Self {
        SpeedtestError::History(error.to_string())
    }
}
