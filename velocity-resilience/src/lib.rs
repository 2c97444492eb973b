//! Resilience patterns for Velocity
//!
//! Every probe runs through a fallback chain: an ordered list of endpoint
//! strategies, and optionally a synthesized value once all of them failed.

pub mod error;
pub mod fallback;
pub mod synthesizer;

// Re-export commonly used types
pub use error::ProbeError;
pub use fallback::{FallbackChain, FallbackPolicy, ProbeStrategy, Resolution};
pub use synthesizer::Synthesizer;
pub use velocity_config::domains::fallback::MbpsRange;
