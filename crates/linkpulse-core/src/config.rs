//! linkpulse.toml configuration parser.
//!
//! The file form keeps every tunable optional and durations as strings;
//! [`CheckerConfig::resolve`] turns it into the concrete [`CheckSettings`]
//! the checker runs with.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::duration::{parse_duration, DurationError};
use crate::types::Endpoint;

pub const DEFAULT_MAX_CONCURRENCY: usize = 5;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(3);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid {field}: {source}")]
    InvalidDuration {
        field: &'static str,
        #[source]
        source: DurationError,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckerConfig {
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub check: CheckSection,
}

/// The `[check]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckSection {
    pub max_concurrency: Option<usize>,
    pub max_retries: Option<u32>,
    pub retry_interval: Option<String>,
    pub cooldown: Option<String>,
    pub probe_timeout: Option<String>,
}

/// Runtime tunables for a checker. Static for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSettings {
    /// Probes allowed in flight at once.
    pub max_concurrency: usize,
    /// Retries after the first attempt of a round.
    pub max_retries: u32,
    /// Wait between a failed attempt and the next one.
    pub retry_interval: Duration,
    /// Wait between the end of a round and the start of the next.
    pub cooldown: Duration,
    /// Upper bound on a single probe.
    pub probe_timeout: Duration,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            cooldown: DEFAULT_COOLDOWN,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl CheckSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl CheckerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Resolve the `[check]` table into concrete settings, filling defaults.
    pub fn resolve(&self) -> Result<CheckSettings, ConfigError> {
        let check = &self.check;
        let settings = CheckSettings {
            max_concurrency: check.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY),
            max_retries: check.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            retry_interval: duration_field(
                "retry_interval",
                check.retry_interval.as_deref(),
                DEFAULT_RETRY_INTERVAL,
            )?,
            cooldown: duration_field("cooldown", check.cooldown.as_deref(), DEFAULT_COOLDOWN)?,
            probe_timeout: duration_field(
                "probe_timeout",
                check.probe_timeout.as_deref(),
                DEFAULT_PROBE_TIMEOUT,
            )?,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// The configured endpoints, in file order.
    pub fn endpoints(&self) -> Result<Vec<Endpoint>, ConfigError> {
        self.endpoints
            .iter()
            .map(|raw| {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    Err(ConfigError::Invalid("endpoint must not be empty".to_string()))
                } else {
                    Ok(Endpoint::new(trimmed))
                }
            })
            .collect()
    }
}

fn duration_field(
    field: &'static str,
    value: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => {
            parse_duration(raw).map_err(|source| ConfigError::InvalidDuration { field, source })
        }
    }
}
