//! Error types for the dispatch runtime
//!
//! `DispatchError` is everything `Dispatcher::run` can fail with. Only
//! transient transport failures are recovered locally; every variant here is
//! fatal to the current run and surfaces to the caller.

use crate::transport::TransportError;
use thiserror::Error;

/// Error a handler may return; it aborts the run it was raised in
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Return type of every handler callback
pub type HandlerResult = Result<(), HandlerError>;

/// Main error type for dispatcher operations
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Missing API token: {0}")]
    MissingToken(String),

    #[error("Failed to connect to the messaging API after {attempts} attempts")]
    FailedConnection { attempts: u32 },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Handler {handler} failed on '{event_type}' event: {source}")]
    Handler {
        handler: String,
        event_type: String,
        #[source]
        source: HandlerError,
    },
}

impl DispatchError {
    /// Create missing token error
    pub fn missing_token<S: Into<String>>(message: S) -> Self {
        Self::MissingToken(message.into())
    }

    /// Create failed connection error
    pub fn failed_connection(attempts: u32) -> Self {
        Self::FailedConnection { attempts }
    }

    /// True for errors raised before the event loop started
    pub fn is_setup_error(&self) -> bool {
        matches!(self, Self::MissingToken(_) | Self::Configuration(_))
    }
}

/// Invalid connector or handler setup
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Invalid connector: {0}")]
    InvalidConnector(String),

    #[error("{signature} missing {}", describe_missing(.missing))]
    InvalidHandler {
        signature: String,
        missing: Vec<&'static str>,
    },

    #[error("{handler} does not accept bound arguments: {}", quote_all(.args))]
    UnacceptedArgs { handler: String, args: Vec<String> },

    #[error("No transport factory configured to build a transport from {0}")]
    NoTransportFactory(&'static str),
}

impl ConfigurationError {
    pub fn invalid_connector<S: Into<String>>(kind: S) -> Self {
        Self::InvalidConnector(kind.into())
    }
}

/// "1 required parameter: 'event'" / "2 required parameters: 'transport' and 'event'"
fn describe_missing(missing: &[&'static str]) -> String {
    let plural = if missing.len() == 1 { "" } else { "s" };
    format!(
        "{} required parameter{plural}: {}",
        missing.len(),
        quote_all(missing)
    )
}

/// "'a'" / "'a' and 'b'" / "'a', 'b' and 'c'"
fn quote_all<S: AsRef<str>>(names: &[S]) -> String {
    let quoted: Vec<String> = names
        .iter()
        .map(|name| format!("'{}'", name.as_ref()))
        .collect();
    match quoted.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{} and {last}", rest.join(", ")),
        Some((last, _)) => last.clone(),
        None => String::new(),
    }
}

/// Result type for dispatcher operations
pub type DispatchResult<T> = Result<T, DispatchError>;
