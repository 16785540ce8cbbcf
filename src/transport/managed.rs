//! Connection ownership and reconnection for one dispatch run
//!
//! [`ManagedTransport`] owns the transport handle for the lifetime of a run.
//! It connects with retry as soon as it is established ("connection is
//! initialization"), and turns transient poll failures into reconnects so the
//! event loop only ever sees a batch of events or a fatal error.

use super::Transport;
use crate::backoff::Backoff;
use crate::error::DispatchError;
use crate::event::Event;
use crate::observability::metrics::DispatchStats;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Connection state as seen by the runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initial state, nothing attempted yet
    Connecting,
    /// Connected and polling
    Connected,
    /// Between attempts; holds the attempt that just failed
    Reconnecting(u32),
    /// Retries exhausted
    Failed,
}

/// Transport owned by a run, with retry policy attached
pub struct ManagedTransport<T> {
    inner: T,
    retries: u32,
    backoff: Arc<dyn Backoff>,
    state: ConnectionState,
    stats: Arc<DispatchStats>,
}

impl<T: Transport> ManagedTransport<T> {
    /// Take ownership of `inner` and connect it, retrying up to `retries` times
    pub async fn establish(
        inner: T,
        retries: u32,
        backoff: Arc<dyn Backoff>,
        stats: Arc<DispatchStats>,
    ) -> Result<Self, DispatchError> {
        let mut transport = Self {
            inner,
            retries,
            backoff,
            state: ConnectionState::Connecting,
            stats,
        };
        transport.connect_with_retry().await?;
        Ok(transport)
    }

    /// Single connection attempt; the outcome is read back via `is_connected`
    pub async fn connect(&mut self) {
        self.stats.connection_attempt();
        if let Err(e) = self.inner.connect().await {
            debug!(error = %e, "Connection attempt reported an error");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    /// Connect unless already connected, sleeping `backoff(k)` between attempts
    pub async fn connect_with_retry(&mut self) -> Result<(), DispatchError> {
        if self.is_connected() {
            debug!("Already connected to the messaging API");
            self.state = ConnectionState::Connected;
            return Ok(());
        }

        for retry in 1..=self.retries {
            self.connect().await;
            if self.is_connected() {
                debug!(attempt = retry, "Connected to the messaging API");
                self.state = ConnectionState::Connected;
                self.stats.connection_established();
                return Ok(());
            }

            self.stats.connection_failed();
            self.state = ConnectionState::Reconnecting(retry);
            if retry < self.retries {
                let delay = self.backoff.delay(retry);
                debug!(
                    attempt = retry,
                    "Waiting {:.3}s before retrying",
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }
        }

        error!(
            attempts = self.retries,
            "Failed to connect to the messaging API"
        );
        self.state = ConnectionState::Failed;
        Err(DispatchError::failed_connection(self.retries))
    }

    /// Poll once; transient loss reconnects and yields an empty batch
    pub async fn fetch_events(&mut self) -> Result<Vec<Event>, DispatchError> {
        self.stats.poll();
        match self.inner.poll().await {
            Ok(events) => {
                self.stats.events_received(events.len());
                Ok(events)
            }
            Err(e) if e.is_transient() => {
                warn!(error = %e, "Lost connection to the messaging API, attempting to reconnect");
                self.stats.connection_lost();
                self.connect_with_retry().await?;
                Ok(Vec::new())
            }
            Err(e) => Err(DispatchError::Transport(e)),
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Borrow the transport, e.g. to hand it to handlers
    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> std::fmt::Debug for ManagedTransport<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedTransport")
            .field("retries", &self.retries)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
