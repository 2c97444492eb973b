//! Bounded random values for probes that could not be measured

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use velocity_config::domains::fallback::MbpsRange;

/// Draws plausible throughput values from a configured range
#[derive(Debug)]
pub struct Synthesizer {
    rng: Mutex<StdRng>,
}

impl Synthesizer {
    /// Synthesizer seeded from the OS
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic synthesizer, for tests and reproducible runs
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// A value in `[range.min, range.max)`
    pub fn sample(&self, range: MbpsRange) -> f64 {
        if range.max <= range.min {
            return range.min;
        }
        self.rng.lock().random_range(range.min..range.max)
    }
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new()
    }
}
