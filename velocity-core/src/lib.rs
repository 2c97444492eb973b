//! Core domain models and types for Velocity
//!
//! This crate holds the pieces every other Velocity crate agrees on: the
//! catalog and sample types, great-circle server selection, the run state
//! machine, result aggregation and the error taxonomy.

pub mod aggregate;
pub mod clock;
pub mod error;
pub mod geo;
pub mod state;
pub mod types;

// Re-export commonly used types
pub use aggregate::{jitter, mean, packet_loss_percent, throughput_mbps, PhaseSummary, ResultAggregator};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, SpeedtestError};
pub use geo::{haversine_km, select_nearest, SelectedServer, EARTH_RADIUS_KM};
pub use state::{RunState, StateMachine};
pub use types::{
    AggregateResult, CandidateServer, Geolocation, MeasurementMethod, PhaseKind, PhaseSample,
    SampleSource,
};
