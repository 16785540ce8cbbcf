//! Mock implementations for testing
//!
//! Provides a scripted [`MockTransport`] so the dispatcher can be exercised
//! without a live messaging service. All clones share state, so a test can
//! keep a handle after moving a clone into a run and inspect it afterwards.

use crate::event::Event;
use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// (target, message) pair recorded by `send`
pub type SentMessage = (String, String);

#[derive(Debug, Default)]
struct MockState {
    connected: bool,
    connect_script: VecDeque<bool>,
    connect_fallback: bool,
    poll_script: VecDeque<Result<Vec<Event>, TransportError>>,
    connect_calls: u32,
    poll_calls: u32,
    sent: Vec<SentMessage>,
    token: Option<String>,
    fail_sends: bool,
}

/// Scripted transport for tests
///
/// Each `connect` consumes the next scripted outcome; once the script is
/// exhausted every attempt succeeds (or fails, for [`MockTransport::never_connects`]).
/// Each `poll` consumes the next scripted result; an exhausted script yields
/// empty batches. Transient poll errors also drop the connection.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Disconnected transport whose connection attempts succeed
    pub fn new() -> Self {
        Self::from_state(MockState {
            connect_fallback: true,
            ..Default::default()
        })
    }

    /// Transport that is already connected before the run starts
    pub fn connected() -> Self {
        Self::from_state(MockState {
            connected: true,
            connect_fallback: true,
            ..Default::default()
        })
    }

    /// Transport whose connection attempts always fail
    pub fn never_connects() -> Self {
        Self::from_state(MockState::default())
    }

    /// Disconnected transport with scripted connection outcomes
    pub fn with_connections<I: IntoIterator<Item = bool>>(outcomes: I) -> Self {
        Self::from_state(MockState {
            connect_script: outcomes.into_iter().collect(),
            connect_fallback: true,
            ..Default::default()
        })
    }

    /// Script poll results, builder style
    pub fn with_polls(self, polls: Vec<Result<Vec<Event>, TransportError>>) -> Self {
        self.lock().poll_script.extend(polls);
        self
    }

    /// Make every `send` fail, builder style
    pub fn failing_sends(self) -> Self {
        self.lock().fail_sends = true;
        self
    }

    /// Same shared state, tagged with the token it was built from
    pub fn for_token(&self, token: &str) -> Self {
        self.lock().token = Some(token.to_string());
        self.clone()
    }

    pub fn connect_calls(&self) -> u32 {
        self.lock().connect_calls
    }

    pub fn poll_calls(&self) -> u32 {
        self.lock().poll_calls
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.lock().sent.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    /// Drop the connection as if the socket closed
    pub fn disconnect(&self) {
        self.lock().connected = false;
    }

    fn from_state(state: MockState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.connect_calls += 1;
        let fallback = state.connect_fallback;
        let outcome = state.connect_script.pop_front().unwrap_or(fallback);
        state.connected = outcome;
        if outcome {
            Ok(())
        } else {
            Err(TransportError::ConnectionLost(
                "Mock connection failure".to_string(),
            ))
        }
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    async fn poll(&mut self) -> Result<Vec<Event>, TransportError> {
        let mut state = self.lock();
        state.poll_calls += 1;
        match state.poll_script.pop_front() {
            Some(Err(e)) => {
                if e.is_transient() {
                    state.connected = false;
                }
                Err(e)
            }
            Some(Ok(events)) => Ok(events),
            None => Ok(Vec::new()),
        }
    }

    fn send(&self, target: &str, message: &str) -> Result<(), TransportError> {
        let mut state = self.lock();
        if state.fail_sends {
            return Err(TransportError::SendFailed("Mock send failure".to_string()));
        }
        state.sent.push((target.to_string(), message.to_string()));
        Ok(())
    }
}
