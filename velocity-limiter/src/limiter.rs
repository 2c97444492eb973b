//! Sliding-window quota with a minimum gap between runs

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use velocity_config::RateLimitConfig;
use velocity_core::{Clock, SpeedtestError};

use crate::error::{HistoryError, HistoryResult};
use crate::store::HistoryStore;

/// Re-evaluations allowed when the history changes under us
const MAX_RECORD_ATTEMPTS: usize = 3;

/// Which rule blocked a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Too many runs inside the window
    Quota,
    /// Too soon after the previous run
    Cooldown,
}

/// Outcome of evaluating the gates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    Allowed,
    Blocked { gate: Gate, retry_at: i64 },
}

impl GateStatus {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateStatus::Allowed)
    }
}

/// Snapshot for display
#[derive(Debug, Clone, PartialEq)]
pub struct LimiterStatus {
    pub runs_in_window: usize,
    pub max_runs: u32,
    pub window: Duration,
    pub last_run: Option<i64>,
    pub gate: GateStatus,
}

/// Admits run starts against persisted history
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
    record_lock: Mutex<()>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, store: Arc<dyn HistoryStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            store,
            clock,
            record_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    fn window_ms(&self) -> i64 {
        self.config.window.as_millis() as i64
    }

    fn min_interval_ms(&self) -> i64 {
        self.config.min_interval.as_millis() as i64
    }

    /// Apply both gates to `history` at time `now`
    pub fn evaluate(&self, history: &[i64], now: i64) -> GateStatus {
        if !self.config.enabled {
            return GateStatus::Allowed;
        }

        let window = self.window_ms();
        let recent: Vec<i64> = history
            .iter()
            .copied()
            .filter(|t| now - t < window)
            .collect();

        if recent.len() >= self.config.max_runs as usize {
            if let Some(oldest) = recent.iter().min() {
                return GateStatus::Blocked {
                    gate: Gate::Quota,
                    retry_at: oldest + window,
                };
            }
        }

        if let Some(last) = recent.iter().max() {
            let min_interval = self.min_interval_ms();
            if now - last < min_interval {
                return GateStatus::Blocked {
                    gate: Gate::Cooldown,
                    retry_at: last + min_interval,
                };
            }
        }

        GateStatus::Allowed
    }

    /// Evaluate the gates without recording anything
    pub fn check(&self) -> HistoryResult<GateStatus> {
        let now = self.clock.now_millis();
        let history = self.store.read()?;
        Ok(self.evaluate(&history, now))
    }

    /// Current window usage
    pub fn status(&self) -> HistoryResult<LimiterStatus> {
        let now = self.clock.now_millis();
        let history = self.store.read()?;
        let window = self.window_ms();

        Ok(LimiterStatus {
            runs_in_window: history.iter().filter(|t| now - **t < window).count(),
            max_runs: self.config.max_runs,
            window: self.config.window,
            last_run: history.iter().max().copied(),
            gate: self.evaluate(&history, now),
        })
    }

    /// Admit and record a run start.
    ///
    /// The history is pruned to the window, evaluated, and the start is
    /// appended only if the history did not change in between.
    pub fn try_acquire(&self) -> Result<i64, SpeedtestError> {
        let _guard = self.record_lock.lock();

        for attempt in 1..=MAX_RECORD_ATTEMPTS {
            let now = self.clock.now_millis();
            let history = self.store.prune(now - self.window_ms())?;

            if let GateStatus::Blocked { gate, retry_at } = self.evaluate(&history, now) {
                warn!(
                    "Run rejected by {:?} gate, retry in {}",
                    gate,
                    format_countdown(remaining(retry_at, now))
                );
                return Err(SpeedtestError::RateLimited {
                    retry_at: to_datetime(retry_at),
                });
            }

            if self.store.compare_and_append(&history, now)? {
                info!("Recorded run start at {}", now);
                return Ok(now);
            }

            debug!("History changed while recording (attempt {})", attempt);
        }

        Err(HistoryError::Contended.into())
    }

    /// Countdown text until `retry_at`
    pub fn countdown(&self, retry_at: i64) -> String {
        format_countdown(remaining(retry_at, self.clock.now_millis()))
    }

    /// Wait until the gates admit a run.
    ///
    /// `on_tick` receives the countdown text about once per second. The
    /// caller drops the future to stop waiting.
    pub async fn wait_until_allowed<F>(&self, mut on_tick: F) -> HistoryResult<()>
    where
        F: FnMut(&str),
    {
        loop {
            match self.check()? {
                GateStatus::Allowed => return Ok(()),
                GateStatus::Blocked { retry_at, .. } => {
                    let now = self.clock.now_millis();
                    let wait = remaining(retry_at, now);
                    on_tick(&format_countdown(wait));
                    tokio::time::sleep(wait.min(Duration::from_secs(1))).await;
                }
            }
        }
    }
}

fn remaining(retry_at: i64, now: i64) -> Duration {
    Duration::from_millis((retry_at - now).max(0) as u64)
}

fn to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// `"{s}s"` below a minute, `"{m}m {s}s"` otherwise, rounding seconds up
pub fn format_countdown(remaining: Duration) -> String {
    let seconds = remaining.as_millis().div_ceil(1000);
    if seconds < 60 {
        return format!("{}s", seconds);
    }
    format!("{}m {}s", seconds / 60, seconds % 60)
}
