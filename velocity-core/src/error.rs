//! Core error types for Velocity

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::state::RunState;
use crate::types::PhaseKind;

/// Error taxonomy for a speed test run
///
/// Only run-level and setup-level variants ever reach the caller as a failed
/// run. Sample-level failures are absorbed by the fallback layer and only show
/// up in logs and in the result's `method` label.
#[derive(Debug, Error)]
pub enum SpeedtestError {
    /// Catalog could not be loaded; no phase runs
    #[error("Setup failed: {0}")]
    SetupFailure(String),

    /// Geolocation lookup failed; callers fall back to the default location
    #[error("Location lookup failed: {0}")]
    LocationFailure(String),

    /// A single probe failed
    #[error("Probe failed: {0}")]
    ProbeFailure(String),

    /// A phase ran past its deadline
    #[error("{phase} phase timed out after {seconds}s")]
    PhaseTimeout { phase: PhaseKind, seconds: u64 },

    /// The whole run ran past its deadline
    #[error("Speed test timed out after {0}s")]
    RunTimeout(u64),

    /// The rate limiter refused to start the run
    #[error("Too many speed tests, next run allowed at {retry_at}")]
    RateLimited { retry_at: DateTime<Utc> },

    /// The run was stopped or reset while in progress
    #[error("Speed test was cancelled")]
    Cancelled,

    /// A state change outside the transition table
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: RunState, to: RunState },

    /// A phase finished without a usable sample: none at all, or for
    /// throughput phases none that succeeded
    #[error("Run is incomplete: no usable {0} samples recorded")]
    IncompleteRun(PhaseKind),

    /// Test history could not be read or written
    #[error("History error: {0}")]
    History(String),
}

impl SpeedtestError {
    /// Whether this error ends the run in the `error` state
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SpeedtestError::SetupFailure(_)
                | SpeedtestError::RunTimeout(_)
                | SpeedtestError::InvalidTransition { .. }
                | SpeedtestError::IncompleteRun(_)
                | SpeedtestError::History(_)
        )
    }

    /// Whether the caller may simply try again later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SpeedtestError::SetupFailure(_)
                | SpeedtestError::RunTimeout(_)
                | SpeedtestError::RateLimited { .. }
                | SpeedtestError::Cancelled
        )
    }
}

/// Result type alias for Velocity
pub type Result<T> = std::result::Result<T, SpeedtestError>;
