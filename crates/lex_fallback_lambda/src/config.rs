use std::str::FromStr;
use std::time::Duration;

use lex_fallback_core::config::DispatcherConfig;
use lex_fallback_core::error::ConfigurationError;
use tracing::Level;

pub const AGENT_ID_VAR: &str = "BEDROCK_AGENT_ID";
pub const AGENT_ALIAS_ID_VAR: &str = "BEDROCK_AGENT_ALIAS_ID";
pub const TRACE_VAR: &str = "ENABLE_BEDROCK_AGENT_TRACE";
pub const TIMEOUT_VAR: &str = "AGENT_TIMEOUT_SECS";
pub const UPSTREAM_MESSAGE_VAR: &str = "FALLBACK_UPSTREAM_MESSAGE";
pub const PROCESSING_MESSAGE_VAR: &str = "FALLBACK_PROCESSING_MESSAGE";
pub const LOG_LEVEL_VAR: &str = "LOG_LEVEL";
pub const LOG_FORMAT_VAR: &str = "LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            _ => Err(invalid(
                LOG_FORMAT_VAR,
                value,
                "expected json, compact or pretty",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: Level,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Json,
        }
    }
}

/// Everything the Lambda binary needs, read once at cold start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub dispatcher: DispatcherConfig,
    pub logging: LoggingConfig,
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from `lookup`, which returns the raw value
    /// for a variable name. Blank values count as unset.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigurationError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut dispatcher = DispatcherConfig::new(
            read(AGENT_ID_VAR).unwrap_or_default(),
            read(AGENT_ALIAS_ID_VAR).unwrap_or_default(),
        );
        if let Some(value) = read(TRACE_VAR) {
            dispatcher.trace_enabled = parse_flag(TRACE_VAR, &value)?;
        }
        if let Some(value) = read(TIMEOUT_VAR) {
            dispatcher.timeout = parse_timeout(&value)?;
        }
        if let Some(value) = read(UPSTREAM_MESSAGE_VAR) {
            dispatcher.upstream_apology = value;
        }
        if let Some(value) = read(PROCESSING_MESSAGE_VAR) {
            dispatcher.processing_apology = value;
        }
        dispatcher.validate()?;

        let mut logging = LoggingConfig::default();
        if let Some(value) = read(LOG_LEVEL_VAR) {
            logging.level = value.parse::<Level>().map_err(|_| {
                invalid(
                    LOG_LEVEL_VAR,
                    &value,
                    "expected trace, debug, info, warn or error",
                )
            })?;
        }
        if let Some(value) = read(LOG_FORMAT_VAR) {
            logging.format = value.parse::<LogFormat>()?;
        }

        Ok(Self {
            dispatcher,
            logging,
        })
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigurationError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value, "expected true or false")),
    }
}

fn parse_timeout(value: &str) -> Result<Duration, ConfigurationError> {
    match value.parse::<u64>() {
        Ok(seconds) if seconds > 0 => Ok(Duration::from_secs(seconds)),
        _ => Err(invalid(
            TIMEOUT_VAR,
            value,
            "expected a positive number of seconds",
        )),
    }
}
