use std::time::Duration;

use thiserror::Error;

/// Deployment defect detected while validating dispatcher configuration.
///
/// These are fatal: the Lambda binary refuses to start rather than serving
/// requests it can never fulfil.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("agent id must be configured")]
    MissingAgentId,
    #[error("agent alias id must be configured")]
    MissingAgentAliasId,
    #[error("agent timeout must be greater than zero")]
    ZeroTimeout,
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Any failure while talking to the agent service.
///
/// Recovered locally: the dispatcher swaps these for a fixed apology so the
/// bot always receives a well-formed reply.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("agent transport failure: {0}")]
    Transport(String),
    #[error("agent request throttled: {0}")]
    Throttled(String),
    #[error("agent service error: {0}")]
    Service(String),
    #[error("malformed agent response: {0}")]
    MalformedResponse(String),
    #[error("agent reported failure: {0}")]
    AgentFailure(String),
    #[error("agent did not complete within {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl UpstreamError {
    /// Stable label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Throttled(_) => "throttled",
            Self::Service(_) => "service",
            Self::MalformedResponse(_) => "malformed_response",
            Self::AgentFailure(_) => "agent_failure",
            Self::Timeout(_) => "timeout",
        }
    }
}

/// Inbound fallback event that cannot be turned into an agent request.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("malformed fallback event: {0}")]
    Decode(String),
    #[error("fallback event is missing a session id")]
    MissingSessionId,
}
