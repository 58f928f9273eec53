//! Runtime configuration
//!
//! Settings come from defaults, a JSON document, or `TELEPATHY_*`
//! environment variables. Durations are written the humantime way
//! (`"1s"`, `"250ms"`).

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use telepathy_core::RunId;
use telepathy_protocol::RunnerConfig;
use telepathy_provider::RetryPolicy;

pub const ENV_RETRY_ATTEMPTS: &str = "TELEPATHY_RETRY_ATTEMPTS";
pub const ENV_RETRY_BACKOFF: &str = "TELEPATHY_RETRY_BACKOFF";
pub const ENV_RUN_TIMEOUT: &str = "TELEPATHY_RUN_TIMEOUT";
pub const ENV_CONCURRENT_SIDES: &str = "TELEPATHY_CONCURRENT_SIDES";
pub const ENV_FIRST_RUN_ID: &str = "TELEPATHY_FIRST_RUN_ID";
pub const ENV_LOG: &str = "TELEPATHY_LOG";
pub const ENV_LOG_FORMAT: &str = "TELEPATHY_LOG_FORMAT";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("malformed configuration: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format `{}`", other)),
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directives, e.g. `"info,telepathy_sim=debug"`
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            filter: "info".into(),
            format: LogFormat::Pretty,
        }
    }
}

/// Runtime configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Connection attempts per party, including the first
    pub retry_attempts: u32,
    /// Pause between connection attempts
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
    /// Deadline for one whole run
    #[serde(with = "humantime_serde")]
    pub run_timeout: Duration,
    /// Measure Alice's and Bob's sides on separate blocking tasks
    pub concurrent_sides: bool,
    /// Id of the first run
    pub first_run_id: u64,
    pub log: LogConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            retry_attempts: 5,
            retry_backoff: Duration::from_secs(1),
            run_timeout: Duration::from_secs(30),
            concurrent_sides: true,
            first_run_id: 1,
            log: LogConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by any `TELEPATHY_*` variables that are set
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = RuntimeConfig::default();

        if let Some(value) = lookup(ENV_RETRY_ATTEMPTS) {
            config.retry_attempts = parse_value(ENV_RETRY_ATTEMPTS, &value)?;
        }
        if let Some(value) = lookup(ENV_RETRY_BACKOFF) {
            config.retry_backoff = parse_duration(ENV_RETRY_BACKOFF, &value)?;
        }
        if let Some(value) = lookup(ENV_RUN_TIMEOUT) {
            config.run_timeout = parse_duration(ENV_RUN_TIMEOUT, &value)?;
        }
        if let Some(value) = lookup(ENV_CONCURRENT_SIDES) {
            config.concurrent_sides = parse_flag(ENV_CONCURRENT_SIDES, &value)?;
        }
        if let Some(value) = lookup(ENV_FIRST_RUN_ID) {
            config.first_run_id = parse_value(ENV_FIRST_RUN_ID, &value)?;
        }
        if let Some(value) = lookup(ENV_LOG) {
            config.log.filter = value;
        }
        if let Some(value) = lookup(ENV_LOG_FORMAT) {
            config.log.format = parse_value(ENV_LOG_FORMAT, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "retry_attempts",
                value: "0".into(),
                reason: "at least one attempt is required".into(),
            });
        }
        if self.run_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "run_timeout",
                value: "0s".into(),
                reason: "a run needs a non-zero deadline".into(),
            });
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, self.retry_backoff)
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            retry: self.retry_policy(),
            first_run_id: RunId::new(self.first_run_id),
        }
    }
}

fn parse_value<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            value: value.into(),
            reason: e.to_string(),
        })
}

fn parse_duration(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| ConfigError::InvalidValue {
        key,
        value: value.into(),
        reason: e.to_string(),
    })
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.into(),
            reason: "expected a boolean".into(),
        }),
    }
}

mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
