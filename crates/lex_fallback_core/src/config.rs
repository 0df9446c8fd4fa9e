use std::time::Duration;

use crate::error::ConfigurationError;

/// Leaves headroom under the two-minute function timeout the bot is deployed with.
pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(110);
pub const DEFAULT_UPSTREAM_APOLOGY: &str =
    "I apologize, but I'm having trouble accessing the agent right now.";
pub const DEFAULT_PROCESSING_APOLOGY: &str =
    "I apologize, but I'm having trouble processing your request right now.";

/// Deployment-time settings for a [`crate::dispatcher::FallbackDispatcher`].
///
/// Constant for the lifetime of the process. Built by the runtime crate from
/// the environment, or directly in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub agent_id: String,
    pub agent_alias_id: String,
    pub trace_enabled: bool,
    /// Bound on the whole agent call, including draining the stream.
    pub timeout: Duration,
    /// Reply text used when the agent call fails.
    pub upstream_apology: String,
    /// Reply text used when the inbound event itself is unusable.
    pub processing_apology: String,
}

impl DispatcherConfig {
    pub fn new(agent_id: impl Into<String>, agent_alias_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_alias_id: agent_alias_id.into(),
            trace_enabled: false,
            timeout: DEFAULT_AGENT_TIMEOUT,
            upstream_apology: DEFAULT_UPSTREAM_APOLOGY.to_string(),
            processing_apology: DEFAULT_PROCESSING_APOLOGY.to_string(),
        }
    }

    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace_enabled = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.agent_id.trim().is_empty() {
            return Err(ConfigurationError::MissingAgentId);
        }
        if self.agent_alias_id.trim().is_empty() {
            return Err(ConfigurationError::MissingAgentAliasId);
        }
        if self.timeout.is_zero() {
            return Err(ConfigurationError::ZeroTimeout);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_once_ids_are_set() {
        let config = DispatcherConfig::new("AG123", "AL456");
        assert_eq!(config.timeout, DEFAULT_AGENT_TIMEOUT);
        assert!(!config.trace_enabled);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_blank_agent_id() {
        let config = DispatcherConfig::new("  ", "AL456");
        assert_eq!(config.validate(), Err(ConfigurationError::MissingAgentId));
    }

    #[test]
    fn rejects_missing_alias_id() {
        let config = DispatcherConfig::new("AG123", "");
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::MissingAgentAliasId)
        );
    }

    #[test]
    fn rejects_zero_timeout() {
        let config = DispatcherConfig::new("AG123", "AL456").with_timeout(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigurationError::ZeroTimeout));
    }
}
