//! Ordered probe strategies with a synthesized last resort

use log::{debug, warn};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use velocity_config::domains::fallback::MbpsRange;
use velocity_core::SampleSource;

use crate::error::ProbeError;
use crate::synthesizer::Synthesizer;

/// One way of performing a probe
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeStrategy {
    pub url: String,
    pub source: SampleSource,
}

impl ProbeStrategy {
    pub fn primary(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            source: SampleSource::Primary,
        }
    }

    pub fn alternate(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            source: SampleSource::Alternate,
        }
    }
}

/// Strategies to try in order, plus the range to synthesize from once all failed
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackPolicy {
    pub strategies: Vec<ProbeStrategy>,
    pub synthesizer: Option<MbpsRange>,
}

impl FallbackPolicy {
    pub fn new(primary: ProbeStrategy) -> Self {
        Self {
            strategies: vec![primary],
            synthesizer: None,
        }
    }

    pub fn with_alternate(mut self, alternate: Option<ProbeStrategy>) -> Self {
        self.strategies.extend(alternate);
        self
    }

    pub fn with_synthesizer(mut self, range: Option<MbpsRange>) -> Self {
        self.synthesizer = range;
        self
    }
}

/// How a chain produced its value
#[derive(Debug, Clone)]
pub enum Resolution<T> {
    /// A strategy succeeded
    Probed {
        value: T,
        source: SampleSource,
        url: String,
        failures: Vec<ProbeError>,
    },
    /// Every strategy failed and a value was drawn from the policy's range
    Synthesized { mbps: f64, failures: Vec<ProbeError> },
}

impl<T> Resolution<T> {
    pub fn source(&self) -> SampleSource {
        match self {
            Resolution::Probed { source, .. } => *source,
            Resolution::Synthesized { .. } => SampleSource::Synthesized,
        }
    }

    pub fn failures(&self) -> &[ProbeError] {
        match self {
            Resolution::Probed { failures, .. } | Resolution::Synthesized { failures, .. } => {
                failures
            }
        }
    }
}

/// Evaluates fallback policies: first success wins
#[derive(Debug, Clone)]
pub struct FallbackChain {
    attempt_timeout: Duration,
    synthesizer: Arc<Synthesizer>,
}

impl FallbackChain {
    pub fn new(attempt_timeout: Duration) -> Self {
        Self::with_synthesizer(attempt_timeout, Arc::new(Synthesizer::new()))
    }

    pub fn with_synthesizer(attempt_timeout: Duration, synthesizer: Arc<Synthesizer>) -> Self {
        Self {
            attempt_timeout,
            synthesizer,
        }
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    pub fn synthesizer(&self) -> &Synthesizer {
        &self.synthesizer
    }

    /// Run `attempt` against each strategy of `policy` until one succeeds.
    ///
    /// Each attempt is bounded by the chain's attempt timeout. When all
    /// strategies fail the policy's synthesizer range is used; without one
    /// the chain fails with [`ProbeError::Exhausted`].
    pub async fn resolve<F, Fut, T, E>(
        &self,
        policy: &FallbackPolicy,
        mut attempt: F,
    ) -> Result<Resolution<T>, ProbeError>
    where
        F: FnMut(&ProbeStrategy) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut failures = Vec::new();

        for strategy in &policy.strategies {
            debug!("Probing {} ({:?})", strategy.url, strategy.source);

            let failure = match timeout(self.attempt_timeout, attempt(strategy)).await {
                Ok(Ok(value)) => {
                    if strategy.source != SampleSource::Primary {
                        warn!(
                            "Using alternate endpoint {} after {} failed attempt(s)",
                            strategy.url,
                            failures.len()
                        );
                    }
                    return Ok(Resolution::Probed {
                        value,
                        source: strategy.source,
                        url: strategy.url.clone(),
                        failures,
                    });
                }
                Ok(Err(e)) => ProbeError::Failed {
                    url: strategy.url.clone(),
                    message: e.to_string(),
                },
                Err(_) => ProbeError::Timeout {
                    url: strategy.url.clone(),
                    timeout: self.attempt_timeout,
                },
            };

            warn!("{}", failure);
            failures.push(failure);
        }

        match policy.synthesizer {
            Some(range) => {
                let mbps = self.synthesizer.sample(range);
                warn!(
                    "All {} probe strategies failed, synthesized {:.1} Mbps",
                    failures.len(),
                    mbps
                );
                Ok(Resolution::Synthesized { mbps, failures })
            }
            None => Err(ProbeError::Exhausted {
                attempts: failures.len(),
                last: failures.last().map(|f| f.to_string()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const PRIMARY: &str = "https://a.example.net/random1048576";
    const ALTERNATE: &str = "https://alt.example.net/__down?bytes=1048576";

    fn policy(synth: Option<MbpsRange>) -> FallbackPolicy {
        FallbackPolicy::new(ProbeStrategy::primary(PRIMARY))
            .with_alternate(Some(ProbeStrategy::alternate(ALTERNATE)))
            .with_synthesizer(synth)
    }

    fn chain() -> FallbackChain {
        FallbackChain::with_synthesizer(Duration::from_secs(5), Arc::new(Synthesizer::seeded(3)))
    }

    #[tokio::test]
    async fn test_primary_success_short_circuits() {
        let calls = AtomicU32::new(0);
        let resolution = chain()
            .resolve(&policy(None), |_| {
                calls.fetch_add(1, Ordering::Relaxed);
                async { Ok::<_, String>(42.0) }
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(resolution.source(), SampleSource::Primary);
        assert!(resolution.failures().is_empty());
        assert!(matches!(resolution, Resolution::Probed { value, .. } if value == 42.0));
    }

    #[tokio::test]
    async fn test_alternate_after_primary_failure() {
        let resolution = chain()
            .resolve(&policy(None), |strategy| {
                let ok = strategy.source == SampleSource::Alternate;
                async move {
                    if ok {
                        Ok(12.5)
                    } else {
                        Err("503 Service Unavailable")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(resolution.source(), SampleSource::Alternate);
        assert_eq!(resolution.failures().len(), 1);
        assert_eq!(resolution.failures()[0].url(), Some(PRIMARY));
    }

    #[tokio::test]
    async fn test_synthesized_when_all_fail() {
        let range = MbpsRange { min: 10.0, max: 60.0 };
        let resolution = chain()
            .resolve(&policy(Some(range)), |_| async {
                Err::<f64, _>("connection refused")
            })
            .await
            .unwrap();

        assert_eq!(resolution.source(), SampleSource::Synthesized);
        assert_eq!(resolution.failures().len(), 2);
        match resolution {
            Resolution::Synthesized { mbps, .. } => assert!((10.0..60.0).contains(&mbps)),
            other => panic!("expected synthesized value, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exhausted_without_synthesizer() {
        let err = chain()
            .resolve(&policy(None), |_| async { Err::<f64, _>("refused") })
            .await
            .unwrap_err();

        assert!(matches!(err, ProbeError::Exhausted { attempts: 2, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_moves_to_next_strategy() {
        let chain = FallbackChain::with_synthesizer(
            Duration::from_millis(500),
            Arc::new(Synthesizer::seeded(3)),
        );

        let resolution = chain
            .resolve(&policy(None), |strategy| {
                let slow = strategy.source == SampleSource::Primary;
                async move {
                    if slow {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                    }
                    Ok::<_, String>(7.0)
                }
            })
            .await
            .unwrap();

        assert_eq!(resolution.source(), SampleSource::Alternate);
        assert!(resolution.failures()[0].is_timeout());
    }
}
