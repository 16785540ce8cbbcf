//! Event loop: poll, dispatch, sleep
//!
//! A [`Dispatcher`] holds the handler registry and knows how to obtain a
//! transport. Each call to [`Dispatcher::run`] resolves a connector, connects
//! with retry, and then alternates between polling for events and invoking the
//! handlers registered for them until the `until` predicate says stop.

use crate::backoff::{Backoff, TruncatedExponential};
use crate::error::{ConfigurationError, DispatchError};
use crate::event::{BoundArgs, Event};
use crate::handler::{HandlerRegistry, IntoHandler};
use crate::observability::metrics::DispatchStats;
use crate::observability::{connection_span, dispatch_span};
use crate::transport::{
    Connector, ConnectorResolver, ManagedTransport, TokenSource, Transport, TransportFactory,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, trace, Instrument};
use uuid::Uuid;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_RETRIES: u32 = 16;

/// Predicate over the latest batch deciding whether the loop continues
pub type Until = Box<dyn FnMut(&[Event]) -> bool + Send>;

/// Per-run settings
pub struct RunOptions {
    interval: Duration,
    retries: u32,
    backoff: Arc<dyn Backoff>,
    until: Until,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause between poll cycles
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Connection attempts per (re)connect
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn backoff<B: Backoff + 'static>(mut self, backoff: B) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    /// Stop the loop once `until` returns false for a batch
    pub fn until<F>(mut self, until: F) -> Self
    where
        F: FnMut(&[Event]) -> bool + Send + 'static,
    {
        self.until = Box::new(until);
        self
    }

    pub fn get_interval(&self) -> Duration {
        self.interval
    }

    pub fn get_retries(&self) -> u32 {
        self.retries
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            retries: DEFAULT_RETRIES,
            backoff: Arc::new(TruncatedExponential::default()),
            until: Box::new(|_events: &[Event]| true),
        }
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("interval", &self.interval)
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

/// Handler registry plus the means to obtain a transport
pub struct Dispatcher<T>
where
    T: Transport + 'static,
{
    registry: HandlerRegistry<T>,
    resolver: ConnectorResolver<T>,
    stats: Arc<DispatchStats>,
}

impl<T> Dispatcher<T>
where
    T: Transport + 'static,
{
    /// Empty registry, token read from `RTM_API_TOKEN`
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            resolver: ConnectorResolver::new(),
            stats: Arc::new(DispatchStats::new()),
        }
    }

    /// Environment variable consulted when `run` gets no connector
    pub fn with_env_var<S: Into<String>>(mut self, name: S) -> Self {
        self.resolver.set_default_env_var(name);
        self
    }

    /// Builds transports from tokens
    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: TransportFactory<T> + 'static,
    {
        self.resolver.set_factory(Arc::new(factory));
        self
    }

    /// Replace the process environment as the source of tokens
    pub fn with_token_source<S>(mut self, tokens: S) -> Self
    where
        S: TokenSource + 'static,
    {
        self.resolver.set_token_source(Arc::new(tokens));
        self
    }

    pub fn register<F, M>(
        &mut self,
        event_type: impl Into<String>,
        handler: F,
        args: Option<BoundArgs>,
    ) -> Result<(), ConfigurationError>
    where
        F: IntoHandler<T, M>,
    {
        self.registry.register(event_type, handler, args)
    }

    pub fn register_named<F, M>(
        &mut self,
        event_type: impl Into<String>,
        name: impl Into<String>,
        handler: F,
        args: Option<BoundArgs>,
    ) -> Result<(), ConfigurationError>
    where
        F: IntoHandler<T, M>,
    {
        self.registry.register_named(event_type, name, handler, args)
    }

    pub fn on<F, M>(
        &mut self,
        event_type: impl Into<String>,
        handler: F,
    ) -> Result<(), ConfigurationError>
    where
        F: IntoHandler<T, M>,
    {
        self.registry.on(event_type, handler)
    }

    pub fn registry(&self) -> &HandlerRegistry<T> {
        &self.registry
    }

    pub fn stats(&self) -> &Arc<DispatchStats> {
        &self.stats
    }

    /// Connect and dispatch events until `options.until` returns false
    ///
    /// `None` reads the token from the default environment variable. Handler
    /// errors, non-transient transport errors and exhausted retries end the
    /// run with an error.
    pub async fn run(
        &self,
        connector: Option<Connector<T>>,
        options: RunOptions,
    ) -> Result<(), DispatchError> {
        let span = dispatch_span!(run_id = %Uuid::new_v4(), retries = options.retries);
        self.run_inner(connector, options).instrument(span).await
    }

    async fn run_inner(
        &self,
        connector: Option<Connector<T>>,
        options: RunOptions,
    ) -> Result<(), DispatchError> {
        let RunOptions {
            interval,
            retries,
            backoff,
            mut until,
        } = options;

        self.stats.run_started();
        let transport = self.resolver.resolve(connector)?;
        let mut transport =
            ManagedTransport::establish(transport, retries, backoff, self.stats.clone())
                .instrument(connection_span!(retries))
                .await?;

        info!(
            handlers = self.registry.len(),
            event_types = ?self.registry.event_types(),
            "Dispatch loop started"
        );

        loop {
            let events = transport.fetch_events().await?;
            if !until(&events) {
                info!("Stop condition reached, leaving dispatch loop");
                return Ok(());
            }

            for event in &events {
                self.dispatch(transport.inner(), event)?;
            }

            tokio::time::sleep(interval).await;
        }
    }

    /// Invoke every handler registered for the event, in lookup order
    fn dispatch(&self, transport: &T, event: &Event) -> Result<(), DispatchError> {
        let registrations = self.registry.lookup_event(event);
        if registrations.is_empty() {
            return Ok(());
        }

        let event_type = event.type_label();
        for registration in registrations {
            trace!(
                event_type = %event_type,
                handler = registration.name(),
                "Dispatching event"
            );
            self.stats.handler_invoked();
            registration.invoke(transport, event).map_err(|source| {
                self.stats.handler_failed();
                DispatchError::Handler {
                    handler: registration.name().to_string(),
                    event_type: event_type.clone(),
                    source,
                }
            })?;
        }
        Ok(())
    }
}

impl<T> Default for Dispatcher<T>
where
    T: Transport + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Dispatcher<T>
where
    T: Transport + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("default_env_var", &self.resolver.default_env_var())
            .finish_non_exhaustive()
    }
}
