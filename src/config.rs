//! TOML configuration for dispatch runs
//!
//! ```toml
//! [connection]
//! kind = "env"
//! value = "RTM_API_TOKEN"
//!
//! [dispatch]
//! interval_ms = 500
//! retries = 16
//!
//! [backoff]
//! strategy = "truncated_exponential"
//! cap_ms = 64000
//! max_jitter_ms = 1000
//! ```
//!
//! Every section is optional. Without `[connection]` the dispatcher falls back
//! to its default environment variable.

use crate::backoff::{
    Constant, Pattern, TruncatedExponential, DEFAULT_CAP_MS, DEFAULT_MAX_JITTER_MS,
};
use crate::dispatcher::{RunOptions, DEFAULT_INTERVAL, DEFAULT_RETRIES};
use crate::error::ConfigurationError;
use crate::transport::Connector;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DispatchConfig {
    pub connection: Option<ConnectionSection>,
    #[serde(default)]
    pub dispatch: DispatchSection,
    #[serde(default)]
    pub backoff: BackoffConfig,
}

/// Where the transport comes from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionSection {
    /// "token" or "env"
    pub kind: String,
    /// The token itself, or the name of the variable holding it
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchSection {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            retries: default_retries(),
        }
    }
}

fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL.as_millis() as u64
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

fn default_cap_ms() -> u64 {
    DEFAULT_CAP_MS
}

fn default_max_jitter_ms() -> u64 {
    DEFAULT_MAX_JITTER_MS
}

/// Backoff strategy, selected by the `strategy` key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum BackoffConfig {
    TruncatedExponential {
        #[serde(default = "default_cap_ms")]
        cap_ms: u64,
        #[serde(default = "default_max_jitter_ms")]
        max_jitter_ms: u64,
    },
    Constant {
        delay_ms: u64,
    },
    Pattern {
        #[serde(default)]
        steps_ms: Vec<u64>,
        #[serde(default)]
        sustained_ms: u64,
    },
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::TruncatedExponential {
            cap_ms: DEFAULT_CAP_MS,
            max_jitter_ms: DEFAULT_MAX_JITTER_MS,
        }
    }
}

impl BackoffConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::TruncatedExponential { cap_ms: 0, .. } => Err(ConfigError::InvalidConfig(
                "truncated_exponential backoff requires cap_ms > 0".to_string(),
            )),
            Self::Pattern {
                steps_ms,
                sustained_ms: 0,
            } if steps_ms.is_empty() => Err(ConfigError::InvalidConfig(
                "pattern backoff requires steps_ms or a non-zero sustained_ms".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DispatchConfig {
    /// Load and validate a configuration file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DispatchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(connection) = &self.connection {
            Connector::<()>::from_parts(&connection.kind, &connection.value)
                .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
        }
        self.backoff.validate()
    }

    /// Options for `Dispatcher::run`; `until` stays at its default
    pub fn run_options(&self) -> RunOptions {
        let options = RunOptions::new()
            .interval(Duration::from_millis(self.dispatch.interval_ms))
            .retries(self.dispatch.retries);

        match &self.backoff {
            BackoffConfig::TruncatedExponential {
                cap_ms,
                max_jitter_ms,
            } => options.backoff(TruncatedExponential {
                cap_ms: *cap_ms,
                max_jitter_ms: *max_jitter_ms,
            }),
            BackoffConfig::Constant { delay_ms } => {
                options.backoff(Constant(Duration::from_millis(*delay_ms)))
            }
            BackoffConfig::Pattern {
                steps_ms,
                sustained_ms,
            } => options.backoff(Pattern {
                steps_ms: steps_ms.clone(),
                sustained_ms: *sustained_ms,
            }),
        }
    }

    /// Connector described by `[connection]`, `None` when the section is absent
    pub fn connector<T>(&self) -> Result<Option<Connector<T>>, ConfigurationError> {
        self.connection
            .as_ref()
            .map(|connection| Connector::from_parts(&connection.kind, &connection.value))
            .transpose()
    }
}
