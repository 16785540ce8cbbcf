//! Connector resolution
//!
//! A connector says where the transport for a run comes from: an explicit
//! token, the name of an environment variable holding one, or a transport the
//! caller already built (and possibly already connected).

use super::TransportFactory;
use crate::error::{ConfigurationError, DispatchError};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Environment variable consulted when no connector is given
pub const DEFAULT_TOKEN_ENV: &str = "RTM_API_TOKEN";

/// Source of a transport for one run
pub enum Connector<T> {
    /// An API token used as-is
    Token(String),
    /// Name of an environment variable holding the token
    EnvVar(String),
    /// A transport built by the caller, used unmodified
    Existing(T),
}

impl<T> Connector<T> {
    pub fn token<S: Into<String>>(token: S) -> Self {
        Self::Token(token.into())
    }

    pub fn env_var<S: Into<String>>(name: S) -> Self {
        Self::EnvVar(name.into())
    }

    /// Build a connector from a textual kind, as found in config files
    pub fn from_parts(kind: &str, value: &str) -> Result<Self, ConfigurationError> {
        match kind.to_lowercase().as_str() {
            "token" => Ok(Self::Token(value.to_string())),
            "env" | "env_var" => Ok(Self::EnvVar(value.to_string())),
            _ => Err(ConfigurationError::invalid_connector(kind)),
        }
    }

    /// Short name of the variant, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Token(_) => "token",
            Self::EnvVar(_) => "env_var",
            Self::Existing(_) => "existing",
        }
    }
}

impl<T> fmt::Debug for Connector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Token(***)"),
            Self::EnvVar(name) => f.debug_tuple("EnvVar").field(name).finish(),
            Self::Existing(_) => f.write_str("Existing(..)"),
        }
    }
}

/// Lookup of tokens by variable name
pub trait TokenSource: Send + Sync {
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Reads tokens from the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl TokenSource for ProcessEnv {
    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl TokenSource for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Turns an optional [`Connector`] into a transport
pub struct ConnectorResolver<T> {
    default_env_var: String,
    factory: Option<Arc<dyn TransportFactory<T>>>,
    tokens: Arc<dyn TokenSource>,
}

impl<T> ConnectorResolver<T> {
    pub fn new() -> Self {
        Self {
            default_env_var: DEFAULT_TOKEN_ENV.to_string(),
            factory: None,
            tokens: Arc::new(ProcessEnv),
        }
    }

    pub fn set_default_env_var<S: Into<String>>(&mut self, name: S) {
        self.default_env_var = name.into();
    }

    pub fn set_factory(&mut self, factory: Arc<dyn TransportFactory<T>>) {
        self.factory = Some(factory);
    }

    pub fn set_token_source(&mut self, tokens: Arc<dyn TokenSource>) {
        self.tokens = tokens;
    }

    pub fn default_env_var(&self) -> &str {
        &self.default_env_var
    }

    /// Resolve a connector; `None` means the default environment variable
    pub fn resolve(&self, connector: Option<Connector<T>>) -> Result<T, DispatchError> {
        let connector =
            connector.unwrap_or_else(|| Connector::EnvVar(self.default_env_var.clone()));
        debug!(kind = connector.kind(), "Resolving connector");

        match connector {
            Connector::EnvVar(name) => {
                let token = self
                    .tokens
                    .lookup(&name)
                    .filter(|token| !token.is_empty())
                    .ok_or_else(|| {
                        DispatchError::missing_token(format!("Could not acquire token from {name}"))
                    })?;
                self.build(&token, "an environment variable")
            }
            Connector::Token(token) => {
                if token.is_empty() {
                    return Err(DispatchError::missing_token(
                        "The empty string is an invalid API token",
                    ));
                }
                self.build(&token, "a token")
            }
            Connector::Existing(transport) => Ok(transport),
        }
    }

    fn build(&self, token: &str, source: &'static str) -> Result<T, DispatchError> {
        let factory = self
            .factory
            .as_ref()
            .ok_or(ConfigurationError::NoTransportFactory(source))?;
        Ok(factory.create(token))
    }
}

impl<T> Default for ConnectorResolver<T> {
    fn default() -> Self {
        Self::new()
    }
}
