//! Transport layer for the dispatch runtime
//!
//! The runtime never speaks a wire protocol itself. It drives an abstract
//! [`Transport`] (the chat-service client) and keeps it connected:
//!
//! - [`connector`] - resolves a token, an environment variable or an existing
//!   handle into a transport
//! - [`managed`] - owns the transport for one run, reconnecting with backoff

use crate::event::Event;
use async_trait::async_trait;
use thiserror::Error;

pub mod connector;
pub mod managed;

pub use connector::{Connector, ConnectorResolver, ProcessEnv, TokenSource};
pub use managed::ManagedTransport;

/// Client capability consumed by the dispatcher
///
/// Implementations wrap a real-time messaging client. `send` is synchronous
/// so handlers, which run inline on the dispatch task, can reply without
/// awaiting; implementations are expected to enqueue.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a single connection attempt
    ///
    /// Failure does not have to be reported here; callers check
    /// [`Transport::is_connected`] afterwards.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Live connection status
    fn is_connected(&self) -> bool;

    /// Read the next batch of events, possibly empty
    ///
    /// Must return [`TransportError::Timeout`] or
    /// [`TransportError::ConnectionLost`] on transient loss so the runtime can
    /// reconnect.
    async fn poll(&mut self) -> Result<Vec<Event>, TransportError>;

    /// Send a message to a target (channel, user, ...)
    fn send(&self, target: &str, message: &str) -> Result<(), TransportError>;
}

/// Builds a fresh transport from an API token
pub trait TransportFactory<T>: Send + Sync {
    fn create(&self, token: &str) -> T;
}

impl<T, F> TransportFactory<T> for F
where
    F: Fn(&str) -> T + Send + Sync,
{
    fn create(&self, token: &str) -> T {
        self(token)
    }
}

/// Errors reported by transports
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Timed out waiting for events")]
    Timeout,
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
    #[error("Send failed: {0}")]
    SendFailed(String),
    #[error("Transport failure")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Transient errors are recovered by reconnecting; anything else is fatal
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::ConnectionLost(_))
    }

    pub fn other<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Other(error.into())
    }
}
