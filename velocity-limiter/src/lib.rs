//! Run history and rate limiting for Velocity
//!
//! Every run start is recorded as an epoch-millisecond timestamp. The limiter
//! admits a new run only while fewer than `max_runs` starts fall inside the
//! sliding window and the last start is at least `min_interval` old.

pub mod error;
pub mod limiter;
pub mod store;

pub use error::{HistoryError, HistoryResult};
pub use limiter::{format_countdown, Gate, GateStatus, LimiterStatus, RateLimiter};
pub use store::{HistoryStore, InMemoryHistoryStore, JsonFileHistoryStore};
