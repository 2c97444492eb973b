//! Run events for anything following a speed test

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;
use velocity_core::{AggregateResult, PhaseSample, RunState};

/// Maximum number of events buffered per subscriber
const EVENT_BUFFER_SIZE: usize = 256;

/// Something that happened during a run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    StateChanged { from: RunState, to: RunState },
    /// Cosmetic progress in percent
    Progress { percent: u8 },
    Sample(PhaseSample),
    Completed(AggregateResult),
    Failed { message: String },
}

/// Progress percentage on entering `state`, or on the `index`-th step of a phase
pub fn progress_percent(state: RunState, index: usize) -> u8 {
    let index = index.min(u8::MAX as usize) as u32;
    let percent = match state {
        RunState::Idle | RunState::Error => 0,
        RunState::Locating => 10,
        RunState::Selecting => 20,
        RunState::Ping => 30 + 4 * index,
        RunState::Download => 50 + 5 * index,
        RunState::Upload => 80 + 5 * index,
        RunState::Complete => 100,
    };
    percent.min(100) as u8
}

/// Fan-out of pipeline events
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self { tx }
    }

    pub fn emit(&self, event: PipelineEvent) {
        match self.tx.send(event) {
            Ok(subscribers) => trace!("Pipeline event sent to {} subscribers", subscribers),
            Err(_) => trace!("No subscribers for pipeline events"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
