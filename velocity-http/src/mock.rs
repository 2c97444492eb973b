//! Offline probe client with scripted responses

use crate::client::ProbeClient;
use crate::errors::HttpError;
use crate::types::{ProbeMethod, ProbeRequest, ProbeResponse};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::debug;

/// A scripted reply
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub body: Vec<u8>,
    /// Reported byte count; the body length when unset
    pub bytes: Option<u64>,
    /// Reported elapsed time; the real wall-clock time when unset
    pub elapsed: Option<Duration>,
    /// Real time spent before replying
    pub delay: Duration,
    /// Fail the request instead of replying
    pub failure: Option<String>,
}

impl MockReply {
    /// Empty 200 response
    pub fn ok() -> Self {
        Self {
            status: 200,
            body: Vec::new(),
            bytes: None,
            elapsed: None,
            delay: Duration::ZERO,
            failure: None,
        }
    }

    /// 200 response with a JSON body
    pub fn json(value: &serde_json::Value) -> Self {
        Self {
            body: value.to_string().into_bytes(),
            ..Self::ok()
        }
    }

    /// Empty response with the given status
    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::ok()
        }
    }

    /// Transport-level failure
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::ok()
        }
    }

    pub fn with_bytes(mut self, bytes: u64) -> Self {
        self.bytes = Some(bytes);
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A request the mock has seen
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: ProbeMethod,
    pub url: String,
    pub body_len: u64,
}

#[derive(Debug)]
struct MockRule {
    method: ProbeMethod,
    prefix: String,
    queue: VecDeque<MockReply>,
    last: MockReply,
}

impl MockRule {
    fn next_reply(&mut self) -> MockReply {
        match self.queue.pop_front() {
            Some(reply) => {
                self.last = reply.clone();
                reply
            }
            None => self.last.clone(),
        }
    }
}

/// Probe client answering from rules keyed by method and URL prefix.
///
/// The longest matching prefix wins. A rule replays its scripted replies in
/// order and then keeps repeating the last one.
#[derive(Debug, Default)]
pub struct MockProbeClient {
    rules: Mutex<Vec<MockRule>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockProbeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer matching requests with `reply`
    pub fn on(self, method: ProbeMethod, prefix: &str, reply: MockReply) -> Self {
        self.on_sequence(method, prefix, vec![reply])
    }

    /// Answer matching requests with `replies` in order
    pub fn on_sequence(self, method: ProbeMethod, prefix: &str, replies: Vec<MockReply>) -> Self {
        self.add_sequence(method, prefix, replies);
        self
    }

    /// Add or replace a rule on a shared client
    pub fn add_sequence(&self, method: ProbeMethod, prefix: &str, replies: Vec<MockReply>) {
        let mut queue: VecDeque<MockReply> = replies.into();
        let Some(first) = queue.front().cloned() else {
            return;
        };
        if queue.len() == 1 {
            queue.clear();
        }

        let mut rules = self.rules.lock();
        rules.retain(|r| !(r.method == method && r.prefix == prefix));
        rules.push(MockRule {
            method,
            prefix: prefix.to_string(),
            queue,
            last: first,
        });
        debug!("Added mock rule for {} {}", method, prefix);
    }

    /// Every request seen so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests whose URL starts with `prefix`
    pub fn request_count(&self, method: ProbeMethod, prefix: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method && r.url.starts_with(prefix))
            .count()
    }

    fn reply_for(&self, method: ProbeMethod, url: &str) -> Option<MockReply> {
        let mut rules = self.rules.lock();
        rules
            .iter_mut()
            .filter(|r| r.method == method && url.starts_with(&r.prefix))
            .max_by_key(|r| r.prefix.len())
            .map(MockRule::next_reply)
    }
}

#[async_trait::async_trait]
impl ProbeClient for MockProbeClient {
    async fn execute(&self, request: ProbeRequest) -> Result<ProbeResponse, HttpError> {
        self.requests.lock().push(RecordedRequest {
            method: request.method,
            url: request.url.clone(),
            body_len: request.body_len(),
        });

        let Some(reply) = self.reply_for(request.method, &request.url) else {
            debug!("No matching mock response found for {} {}", request.method, request.url);
            return Err(HttpError::NoMock {
                method: request.method.to_string(),
                url: request.url,
            });
        };

        let start = Instant::now();
        if !reply.delay.is_zero() {
            match request.timeout {
                Some(timeout) if reply.delay > timeout => {
                    tokio::time::sleep(timeout).await;
                    return Err(HttpError::Timeout {
                        url: request.url,
                        timeout,
                    });
                }
                _ => tokio::time::sleep(reply.delay).await,
            }
        }

        if let Some(message) = reply.failure {
            return Err(HttpError::MockFailure(message));
        }

        let bytes_received = reply.bytes.unwrap_or(reply.body.len() as u64);
        let body = if request.discard_body {
            Vec::new()
        } else {
            reply.body
        };

        Ok(ProbeResponse {
            status: reply.status,
            body,
            bytes_received,
            elapsed: reply.elapsed.unwrap_or_else(|| start.elapsed()),
        })
    }
}
