//! The speed test run: locate, select, then ping, download and upload

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use velocity_config::{PipelineConfig, VelocityConfig};
use velocity_core::{
    AggregateResult, Clock, PhaseKind, PhaseSample, Result, ResultAggregator, RunState,
    SpeedtestError, StateMachine, SystemClock,
};
use velocity_gauge::{GaugeGeometry, LiveGauge};
use velocity_http::{HttpProbeClient, ProbeClient};
use velocity_limiter::{HistoryStore, JsonFileHistoryStore, RateLimiter};
use velocity_resilience::{FallbackChain, Synthesizer};

use crate::catalog::CatalogSource;
use crate::events::{progress_percent, EventBroadcaster, PipelineEvent};
use crate::locator::{select_server, Geolocator, HttpGeolocator, Locator};
use crate::probes::ProbeRunner;

/// Canvas the default gauge lays frames out on
const DEFAULT_CANVAS_SIDE: f64 = 300.0;

/// Assembles a [`SpeedTest`] from configuration plus optional overrides
pub struct SpeedTestBuilder {
    config: VelocityConfig,
    clock: Arc<dyn Clock>,
    client: Option<Arc<dyn ProbeClient>>,
    store: Option<Arc<dyn HistoryStore>>,
    geolocator: Option<Arc<dyn Geolocator>>,
    catalog: Option<CatalogSource>,
    gauge: Option<Arc<LiveGauge>>,
    synthesizer: Option<Arc<Synthesizer>>,
}

impl SpeedTestBuilder {
    pub fn new(config: VelocityConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            client: None,
            store: None,
            geolocator: None,
            catalog: None,
            gauge: None,
            synthesizer: None,
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn client(mut self, client: Arc<dyn ProbeClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn history_store(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn geolocator(mut self, geolocator: Arc<dyn Geolocator>) -> Self {
        self.geolocator = Some(geolocator);
        self
    }

    pub fn catalog(mut self, catalog: CatalogSource) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn gauge(mut self, gauge: Arc<LiveGauge>) -> Self {
        self.gauge = Some(gauge);
        self
    }

    pub fn synthesizer(mut self, synthesizer: Arc<Synthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn build(self) -> Result<SpeedTest> {
        let config = self.config;

        let client: Arc<dyn ProbeClient> = match self.client {
            Some(client) => client,
            None => Arc::new(
                HttpProbeClient::with_config(config.http.clone().into())
                    .map_err(|e| SpeedtestError::SetupFailure(e.to_string()))?,
            ),
        };

        let store: Arc<dyn HistoryStore> = match self.store {
            Some(store) => store,
            None => Arc::new(JsonFileHistoryStore::from_config_path(
                config.rate_limit.history_path.as_deref(),
            )?),
        };

        let geolocator = self.geolocator.unwrap_or_else(|| {
            Arc::new(HttpGeolocator::from_config(Arc::clone(&client), &config.locator))
        });

        let gauge = match self.gauge {
            Some(gauge) => gauge,
            None => {
                let geometry =
                    GaugeGeometry::new(DEFAULT_CANVAS_SIDE, DEFAULT_CANVAS_SIDE, &config.gauge)
                        .map_err(|e| SpeedtestError::SetupFailure(e.to_string()))?;
                Arc::new(LiveGauge::new(&config.gauge, geometry))
            }
        };

        let chain = FallbackChain::with_synthesizer(
            config.http.timeout,
            self.synthesizer.unwrap_or_default(),
        );

        Ok(SpeedTest {
            catalog: self
                .catalog
                .unwrap_or_else(|| CatalogSource::from_config(&config.locator)),
            catalog_timeout: config.http.timeout,
            locator: Locator::from_config(geolocator, &config.locator),
            probes: ProbeRunner::new(
                client,
                chain,
                config.fallback.clone(),
                Arc::clone(&self.clock),
            ),
            limiter: Arc::new(RateLimiter::new(
                config.rate_limit.clone(),
                store,
                Arc::clone(&self.clock),
            )),
            gauge,
            clock: self.clock,
            events: EventBroadcaster::new(),
            machine: Mutex::new(StateMachine::new()),
            cancel: Mutex::new(CancellationToken::new()),
            last_result: Mutex::new(None),
            last_error: Mutex::new(None),
            config: config.pipeline,
        })
    }
}

/// A speed test that can be run, stopped and reset repeatedly
pub struct SpeedTest {
    config: PipelineConfig,
    catalog: CatalogSource,
    catalog_timeout: Duration,
    locator: Locator,
    probes: ProbeRunner,
    limiter: Arc<RateLimiter>,
    gauge: Arc<LiveGauge>,
    clock: Arc<dyn Clock>,
    events: EventBroadcaster,
    machine: Mutex<StateMachine>,
    cancel: Mutex<CancellationToken>,
    last_result: Mutex<Option<AggregateResult>>,
    last_error: Mutex<Option<String>>,
}

impl SpeedTest {
    pub fn builder(config: VelocityConfig) -> SpeedTestBuilder {
        SpeedTestBuilder::new(config)
    }

    pub fn state(&self) -> RunState {
        self.machine.lock().current()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_in_progress()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub fn gauge(&self) -> &Arc<LiveGauge> {
        &self.gauge
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Result of the last completed run
    pub fn last_result(&self) -> Option<AggregateResult> {
        self.last_result.lock().clone()
    }

    /// Message of the last failed run
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    /// Run the whole pipeline once.
    ///
    /// Starts only from `idle` or `complete`; after an error call
    /// [`SpeedTest::reset`] first. A rate-limited start leaves the state
    /// untouched and never reaches the network.
    pub async fn run(&self) -> Result<AggregateResult> {
        let (token, started_at) = self.begin()?;
        let run_timeout = self.config.run_timeout;

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(SpeedtestError::Cancelled),
            result = tokio::time::timeout(run_timeout, self.execute(&token, started_at)) => {
                result.unwrap_or_else(|_| Err(SpeedtestError::RunTimeout(run_timeout.as_secs())))
            }
        };

        match outcome {
            Ok(result) => {
                info!(
                    "Speed test complete: {:.2} Mbps down, {:.2} Mbps up, {:.1} ms ping ({})",
                    result.download_mbps, result.upload_mbps, result.ping_ms, result.method
                );
                self.gauge.show(result.download_mbps);
                *self.last_result.lock() = Some(result.clone());
                self.events.emit(PipelineEvent::Completed(result.clone()));
                Ok(result)
            }
            Err(_) if token.is_cancelled() => Err(SpeedtestError::Cancelled),
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Abort the current run and return to idle. The recorded history entry stays.
    pub fn stop(&self) {
        let from = {
            let mut machine = self.machine.lock();
            self.cancel.lock().cancel();
            machine.reset()
        };
        self.gauge.reset();

        if from == RunState::Idle {
            return;
        }
        if from.is_in_progress() {
            warn!("Speed test cancelled during {}", from);
        }
        self.events.emit(PipelineEvent::StateChanged {
            from,
            to: RunState::Idle,
        });
    }

    /// Stop and forget the last result and error
    pub fn reset(&self) {
        self.stop();
        *self.last_result.lock() = None;
        *self.last_error.lock() = None;
    }

    fn begin(&self) -> Result<(CancellationToken, DateTime<Utc>)> {
        let mut machine = self.machine.lock();
        let current = machine.current();
        if !matches!(current, RunState::Idle | RunState::Complete) {
            return Err(SpeedtestError::InvalidTransition {
                from: current,
                to: RunState::Locating,
            });
        }

        self.limiter.try_acquire()?;

        machine.reset();
        machine.transition(RunState::Locating)?;
        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        drop(machine);

        *self.last_error.lock() = None;
        info!("Starting speed test");
        self.enter(&token, RunState::Idle, RunState::Locating);
        Ok((token, self.clock.now()))
    }

    async fn execute(
        &self,
        token: &CancellationToken,
        started_at: DateTime<Utc>,
    ) -> Result<AggregateResult> {
        let catalog = self
            .catalog
            .load(self.probes.client().as_ref(), self.catalog_timeout)
            .await?;
        let location = self.locator.locate().await;

        self.transition(token, RunState::Selecting)?;
        let selected = select_server(&catalog, &location)?;
        let base = selected.server.base_url().to_string();

        let mut aggregator = ResultAggregator::new();
        for &phase in PhaseKind::all() {
            self.transition(token, phase.into())?;
            self.run_phase(token, phase, &base, &mut aggregator).await?;

            let summary = aggregator.require(phase)?;
            info!(
                "{} phase: {:.2} over {}/{} successful samples ({})",
                phase, summary.value, summary.successes, summary.attempts, summary.method
            );
        }

        let result = aggregator.finish(&selected, &location, started_at, self.clock.now())?;
        self.transition(token, RunState::Complete)?;
        Ok(result)
    }

    async fn run_phase(
        &self,
        token: &CancellationToken,
        phase: PhaseKind,
        base: &str,
        aggregator: &mut ResultAggregator,
    ) -> Result<()> {
        let steps: Vec<Option<u64>> = match phase {
            PhaseKind::Ping => vec![None; self.config.ping_count as usize],
            PhaseKind::Download => self.config.download_sizes.iter().copied().map(Some).collect(),
            PhaseKind::Upload => self.config.upload_sizes.iter().copied().map(Some).collect(),
        };
        let deadline = self
            .config
            .phase_timeout
            .map(|t| tokio::time::Instant::now() + t);
        let mut expired = false;

        for (index, size) in steps.into_iter().enumerate() {
            self.events.emit(PipelineEvent::Progress {
                percent: progress_percent(phase.into(), index),
            });

            let measured = match (expired, deadline) {
                (true, _) => None,
                (false, Some(deadline)) => {
                    tokio::time::timeout_at(deadline, self.probes.probe(phase, base, size))
                        .await
                        .ok()
                }
                (false, None) => Some(self.probes.probe(phase, base, size).await),
            };

            let sample = match measured {
                Some(sample) => sample,
                None => {
                    let timeout = SpeedtestError::PhaseTimeout {
                        phase,
                        seconds: self.config.phase_timeout.unwrap_or_default().as_secs(),
                    };
                    let Some(sample) = self.probes.substitute(phase, size) else {
                        return Err(timeout);
                    };
                    if !expired {
                        warn!("{}; substituting the remaining {} steps", timeout, phase);
                        expired = true;
                    }
                    sample
                }
            };

            self.record(token, sample, aggregator);
        }

        Ok(())
    }

    fn record(
        &self,
        token: &CancellationToken,
        sample: PhaseSample,
        aggregator: &mut ResultAggregator,
    ) {
        if sample.phase.is_throughput() && sample.success && !token.is_cancelled() {
            self.gauge.set_target(sample.derived_value);
        }
        self.events.emit(PipelineEvent::Sample(sample.clone()));
        aggregator.record(sample);
    }

    /// Advance the run. Fails with [`SpeedtestError::Cancelled`] once the
    /// run's token is cancelled, before the machine is touched.
    fn transition(&self, token: &CancellationToken, next: RunState) -> Result<()> {
        let from = {
            let mut machine = self.machine.lock();
            if token.is_cancelled() {
                return Err(SpeedtestError::Cancelled);
            }
            machine.transition(next)?
        };
        self.enter(token, from, next);
        Ok(())
    }

    /// Show a committed state change. [`SpeedTest::stop`] may land between
    /// the commit and this call, so the gauge is only driven while the token
    /// is live and is reset again if the stop races the update.
    fn enter(&self, token: &CancellationToken, from: RunState, to: RunState) {
        if token.is_cancelled() {
            return;
        }
        self.gauge.set_state(to);
        if token.is_cancelled() {
            self.gauge.reset();
            return;
        }

        self.events.emit(PipelineEvent::StateChanged { from, to });
        // Phases report progress per step
        if !matches!(to, RunState::Ping | RunState::Download | RunState::Upload) {
            self.events.emit(PipelineEvent::Progress {
                percent: progress_percent(to, 0),
            });
        }
    }

    fn fail(&self, err: &SpeedtestError) {
        let from = {
            let mut machine = self.machine.lock();
            let from = machine.current();
            if machine.transition(RunState::Error).is_err() {
                return;
            }
            from
        };

        error!("Speed test failed during {}: {}", from, err);
        self.gauge.set_state(RunState::Error);
        *self.last_error.lock() = Some(err.to_string());
        self.events.emit(PipelineEvent::StateChanged {
            from,
            to: RunState::Error,
        });
        self.events.emit(PipelineEvent::Failed {
            message: err.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use velocity_core::{CandidateServer, Geolocation};
    use velocity_http::MockProbeClient;
    use velocity_limiter::InMemoryHistoryStore;

    use crate::locator::FixedGeolocator;

    fn speedtest() -> SpeedTest {
        SpeedTest::builder(VelocityConfig::default())
            .client(Arc::new(MockProbeClient::new()))
            .history_store(Arc::new(InMemoryHistoryStore::new()))
            .geolocator(Arc::new(FixedGeolocator(Geolocation::fallback())))
            .catalog(CatalogSource::Static(vec![CandidateServer::new(
                "Berlin",
                "https://near.example.net",
                52.52,
                13.405,
            )]))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_state_change_after_stop_leaves_gauge_idle() {
        let speedtest = speedtest();
        let mut events = speedtest.subscribe();
        let (token, _) = speedtest.begin().unwrap();
        let from = {
            let mut machine = speedtest.machine.lock();
            machine.transition(RunState::Selecting).unwrap();
            machine.transition(RunState::Ping).unwrap();
            machine.transition(RunState::Download).unwrap()
        };

        // Stop lands after the download transition committed, before the gauge saw it
        speedtest.stop();
        speedtest.enter(&token, from, RunState::Download);

        assert!(!speedtest.gauge().is_animating());
        assert_eq!(speedtest.gauge().state(), RunState::Idle);
        assert_eq!(speedtest.gauge().displayed_speed(), 0.0);
        assert_eq!(speedtest.state(), RunState::Idle);

        let mut announced = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let PipelineEvent::StateChanged { to, .. } = event {
                announced.push(to);
            }
        }
        assert_eq!(announced, vec![RunState::Locating, RunState::Idle]);
    }

    #[tokio::test]
    async fn test_transition_after_stop_is_cancelled() {
        let speedtest = speedtest();
        let (token, _) = speedtest.begin().unwrap();
        speedtest.stop();

        let err = speedtest.transition(&token, RunState::Selecting).unwrap_err();
        assert!(matches!(err, SpeedtestError::Cancelled));
        assert_eq!(speedtest.state(), RunState::Idle);
        assert!(!speedtest.gauge().is_animating());
    }
}
