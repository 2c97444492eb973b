//! Live gauge with a cancellable animation ticker

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use velocity_config::domains::gauge::{GaugeConfig, Theme};
use velocity_core::RunState;

use crate::render::{render, GaugeFrame, GaugeGeometry, GaugeInput};

/// Receives every frame the gauge draws
pub trait GaugeSink: Send + Sync {
    fn draw(&self, frame: &GaugeFrame);
}

/// One animation step.
///
/// Moves `previous` at most `step` toward `target`, adds `noise`, and keeps
/// the result inside `[0, max]`. Without a target the value just wanders.
pub fn next_walk_value(previous: f64, target: Option<f64>, step: f64, noise: f64, max: f64) -> f64 {
    let pull = match target {
        Some(target) => (target - previous).clamp(-step, step),
        None => 0.0,
    };
    (previous + pull + noise).clamp(0.0, max)
}

#[derive(Debug)]
struct GaugeState {
    displayed: f64,
    target: Option<f64>,
    state: RunState,
    theme: Theme,
}

struct Shared {
    state: Mutex<GaugeState>,
    rng: Mutex<StdRng>,
    geometry: GaugeGeometry,
    walk_step: f64,
    sink: Mutex<Option<Arc<dyn GaugeSink>>>,
}

impl Shared {
    fn snapshot(&self) -> GaugeFrame {
        let state = self.state.lock();
        render(
            &GaugeInput {
                speed: state.displayed,
                state: state.state,
                theme: state.theme,
            },
            &self.geometry,
        )
    }

    fn redraw(&self) {
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            let frame = self.snapshot();
            sink.draw(&frame);
        }
    }

    fn step(&self) {
        let noise = self.rng.lock().random_range(-1.0..=1.0) * self.walk_step / 2.0;
        {
            let mut state = self.state.lock();
            state.displayed = next_walk_value(
                state.displayed,
                state.target,
                self.walk_step,
                noise,
                self.geometry.max_scale,
            );
        }
        self.redraw();
    }
}

struct Ticker {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Gauge that redraws on every state or speed change and animates the
/// displayed speed during throughput phases.
///
/// The displayed speed is cosmetic; nothing reads it back into samples.
pub struct LiveGauge {
    shared: Arc<Shared>,
    frame_interval: Duration,
    ticker: Mutex<Option<Ticker>>,
}

impl LiveGauge {
    pub fn new(config: &GaugeConfig, geometry: GaugeGeometry) -> Self {
        Self::build(config, geometry, StdRng::from_os_rng())
    }

    /// Gauge whose animation noise is reproducible
    pub fn seeded(config: &GaugeConfig, geometry: GaugeGeometry, seed: u64) -> Self {
        Self::build(config, geometry, StdRng::seed_from_u64(seed))
    }

    fn build(config: &GaugeConfig, geometry: GaugeGeometry, rng: StdRng) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(GaugeState {
                    displayed: 0.0,
                    target: None,
                    state: RunState::Idle,
                    theme: config.theme,
                }),
                rng: Mutex::new(rng),
                geometry,
                walk_step: config.walk_step,
                sink: Mutex::new(None),
            }),
            frame_interval: config.frame_interval,
            ticker: Mutex::new(None),
        }
    }

    /// Attach the sink frames are drawn to
    pub fn with_sink(self, sink: Arc<dyn GaugeSink>) -> Self {
        self.set_sink(sink);
        self
    }

    pub fn set_sink(&self, sink: Arc<dyn GaugeSink>) {
        *self.shared.sink.lock() = Some(sink);
    }

    /// Follow the run state. Entering a throughput phase starts the ticker,
    /// leaving one stops it.
    pub fn set_state(&self, state: RunState) {
        {
            let mut current = self.shared.state.lock();
            if current.state != state {
                current.target = None;
            }
            current.state = state;
        }

        if state.is_throughput() {
            self.start_ticker();
        } else {
            self.stop_ticker();
        }
        self.shared.redraw();
    }

    /// Latest measured speed; the animation drifts toward it
    pub fn set_target(&self, speed: f64) {
        self.shared.state.lock().target = Some(speed.max(0.0));
        self.shared.redraw();
    }

    /// Jump straight to `speed` without animating
    pub fn show(&self, speed: f64) {
        {
            let mut state = self.shared.state.lock();
            state.displayed = speed.max(0.0);
            state.target = None;
        }
        self.shared.redraw();
    }

    pub fn set_theme(&self, theme: Theme) {
        self.shared.state.lock().theme = theme;
        self.shared.redraw();
    }

    /// Stop animating, zero the speed and return to idle
    pub fn reset(&self) {
        self.stop_ticker();
        {
            let mut state = self.shared.state.lock();
            state.displayed = 0.0;
            state.target = None;
            state.state = RunState::Idle;
        }
        self.shared.redraw();
    }

    pub fn displayed_speed(&self) -> f64 {
        self.shared.state.lock().displayed
    }

    pub fn state(&self) -> RunState {
        self.shared.state.lock().state
    }

    pub fn is_animating(&self) -> bool {
        self.ticker
            .lock()
            .as_ref()
            .map(|t| !t.handle.is_finished())
            .unwrap_or(false)
    }

    /// Current frame
    pub fn frame(&self) -> GaugeFrame {
        self.shared.snapshot()
    }

    fn start_ticker(&self) {
        let mut ticker = self.ticker.lock();
        if ticker.is_some() {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No async runtime, gauge animation disabled");
            return;
        };

        let token = CancellationToken::new();
        let child = token.clone();
        let shared = Arc::clone(&self.shared);
        let period = self.frame_interval;

        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = interval.tick() => shared.step(),
                }
            }
            trace!("Gauge ticker stopped");
        });

        debug!("Gauge ticker started ({}ms)", period.as_millis());
        *ticker = Some(Ticker { token, handle });
    }

    /// Cancel the ticker if it is running
    pub fn stop_ticker(&self) {
        if let Some(ticker) = self.ticker.lock().take() {
            ticker.token.cancel();
            ticker.handle.abort();
        }
    }
}

impl Drop for LiveGauge {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSink {
        frames: AtomicUsize,
        last: Mutex<Option<GaugeFrame>>,
    }

    impl GaugeSink for CountingSink {
        fn draw(&self, frame: &GaugeFrame) {
            self.frames.fetch_add(1, Ordering::Relaxed);
            *self.last.lock() = Some(frame.clone());
        }
    }

    fn gauge(sink: Arc<CountingSink>) -> LiveGauge {
        LiveGauge::seeded(&GaugeConfig::default(), GaugeGeometry::default(), 11).with_sink(sink)
    }

    #[test]
    fn test_walk_value_is_bounded() {
        assert_eq!(next_walk_value(0.0, None, 10.0, -5.0, 400.0), 0.0);
        assert_eq!(next_walk_value(398.0, None, 10.0, 5.0, 400.0), 400.0);
        assert_eq!(next_walk_value(50.0, Some(100.0), 10.0, 0.0, 400.0), 60.0);
        assert_eq!(next_walk_value(50.0, Some(52.0), 10.0, 0.0, 400.0), 52.0);
        assert_eq!(next_walk_value(50.0, Some(0.0), 10.0, 1.0, 400.0), 41.0);
    }

    #[test]
    fn test_state_changes_redraw_without_runtime() {
        let sink = Arc::new(CountingSink::default());
        let gauge = gauge(Arc::clone(&sink));

        gauge.set_state(RunState::Locating);
        gauge.set_state(RunState::Download);
        // No runtime, so no ticker
        assert!(!gauge.is_animating());
        assert_eq!(sink.frames.load(Ordering::Relaxed), 2);

        gauge.show(87.26);
        let last = sink.last.lock().clone().unwrap();
        assert_eq!(last.readout.value, "87.3");
        assert_eq!(last.state, RunState::Download);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_runs_only_in_throughput_phases() {
        let sink = Arc::new(CountingSink::default());
        let gauge = gauge(Arc::clone(&sink));

        gauge.set_state(RunState::Ping);
        assert!(!gauge.is_animating());

        gauge.set_state(RunState::Download);
        assert!(gauge.is_animating());
        gauge.set_target(120.0);

        tokio::time::sleep(Duration::from_millis(16 * 40)).await;
        let speed = gauge.displayed_speed();
        assert!(speed > 0.0 && speed <= 400.0);
        assert!(speed > 60.0, "speed should approach the target, got {speed}");

        gauge.set_state(RunState::Upload);
        assert!(gauge.is_animating());

        gauge.set_state(RunState::Complete);
        assert!(!gauge.is_animating());

        let frames = sink.frames.load(Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(sink.frames.load(Ordering::Relaxed), frames);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_zeroes_and_stops() {
        let gauge = LiveGauge::seeded(&GaugeConfig::default(), GaugeGeometry::default(), 5);

        gauge.set_state(RunState::Download);
        gauge.set_target(300.0);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(gauge.displayed_speed() > 0.0);

        gauge.reset();
        assert!(!gauge.is_animating());
        assert_eq!(gauge.displayed_speed(), 0.0);
        assert_eq!(gauge.state(), RunState::Idle);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(gauge.displayed_speed(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_stops_ticker() {
        let gauge = LiveGauge::seeded(&GaugeConfig::default(), GaugeGeometry::default(), 5);
        gauge.set_state(RunState::Upload);
        assert!(gauge.is_animating());
        gauge.set_state(RunState::Error);
        assert!(!gauge.is_animating());
    }
}
