//! RTM Dispatch - event dispatch runtime for real-time messaging APIs
//!
//! Register handlers by event type, then let a [`Dispatcher`] keep a transport
//! connected and route every polled event to its handlers.
//!
//! # Overview
//!
//! - Handler registry with a `*` wildcard and bound arguments
//! - Connector resolution from a token, an environment variable or an
//!   existing transport
//! - Connect-with-retry and reconnect-on-poll with pluggable backoff
//! - Poll, dispatch and sleep loop with a caller-supplied stop predicate
//!
//! # Quick Start
//!
//! ```rust
//! use rtm_dispatch::testing::MockTransport;
//! use rtm_dispatch::{Connector, Dispatcher, Event, HandlerResult, RunOptions};
//! use rtm_dispatch::transport::Transport;
//! use std::time::Duration;
//!
//! fn say_hello(transport: &MockTransport, _event: &Event) -> HandlerResult {
//!     transport.send("general", "Hello!")?;
//!     Ok(())
//! }
//!
//! # tokio_test::block_on(async {
//! let mut dispatcher = Dispatcher::<MockTransport>::new();
//! dispatcher.on("hello", say_hello).unwrap();
//!
//! let transport = MockTransport::new().with_polls(vec![Ok(vec![Event::new("hello")])]);
//! let mut batches = 0;
//! dispatcher
//!     .run(
//!         Some(Connector::Existing(transport.clone())),
//!         RunOptions::new()
//!             .interval(Duration::ZERO)
//!             .until(move |_events: &[Event]| {
//!                 batches += 1;
//!                 batches <= 1
//!             }),
//!     )
//!     .await
//!     .unwrap();
//!
//! assert_eq!(transport.sent_messages().len(), 1);
//! # });
//! ```

pub mod backoff;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod handler;
pub mod observability;
pub mod testing;
pub mod transport;

pub use backoff::{Backoff, Constant, Pattern, TruncatedExponential};
pub use config::{ConfigError, DispatchConfig};
pub use dispatcher::{Dispatcher, RunOptions};
pub use error::{ConfigurationError, DispatchError, DispatchResult, HandlerError, HandlerResult};
pub use event::{BoundArgs, Event};
pub use handler::{HandlerRegistry, WILDCARD};
pub use transport::{Connector, Transport, TransportError, TransportFactory};
