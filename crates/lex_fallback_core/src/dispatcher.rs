use std::time::{Duration, Instant};

use futures::StreamExt;

use crate::agent::{AgentClient, AgentCompletion, AgentEvent};
use crate::config::DispatcherConfig;
use crate::contract::{InvocationRequest, LexEvent, ReplyEnvelope};
use crate::error::{ConfigurationError, UpstreamError};

/// Bridges a Lex fallback turn to the configured agent.
///
/// Stateless across invocations: the only thing shared between turns is the
/// validated configuration and the client handle.
pub struct FallbackDispatcher<C> {
    config: DispatcherConfig,
    client: C,
}

impl<C: AgentClient> FallbackDispatcher<C> {
    /// Fails before any agent call can be made if the configuration is
    /// unusable.
    pub fn new(config: DispatcherConfig, client: C) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Answers one fallback turn. Always produces a closed, single-message
    /// envelope; agent failures degrade to the configured apology.
    pub async fn dispatch(&self, event: &LexEvent) -> ReplyEnvelope {
        self.dispatch_within(event, self.config.timeout).await
    }

    /// Like [`dispatch`](Self::dispatch), but gives up on the agent once
    /// `budget` has elapsed if that comes before the configured timeout.
    pub async fn dispatch_within(&self, event: &LexEvent, budget: Duration) -> ReplyEnvelope {
        let request = match InvocationRequest::from_event(event, &self.config) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(
                    event_name = "fallback.event_rejected",
                    error = %error,
                    "fallback event cannot be forwarded to the agent"
                );
                return ReplyEnvelope::failed(event, self.config.processing_apology.clone());
            }
        };

        if request.utterance.trim().is_empty() {
            tracing::debug!(
                event_name = "fallback.empty_utterance",
                session_id = %request.session_id,
                "forwarding empty utterance to agent"
            );
        }

        match self.converse_within(&request, budget).await {
            Ok(completion) => ReplyEnvelope::fulfilled(event, completion.text),
            Err(error) => {
                tracing::warn!(
                    event_name = "fallback.agent_failed",
                    session_id = %request.session_id,
                    error_kind = error.kind(),
                    error = %error,
                    "agent call failed; replying with apology"
                );
                ReplyEnvelope::failed(event, self.config.upstream_apology.clone())
            }
        }
    }

    /// Calls the agent and drains its stream, bounded by the configured
    /// timeout.
    pub async fn converse(
        &self,
        request: &InvocationRequest,
    ) -> Result<AgentCompletion, UpstreamError> {
        self.converse_within(request, self.config.timeout).await
    }

    /// Waits at most the shorter of `budget` and the configured timeout.
    pub async fn converse_within(
        &self,
        request: &InvocationRequest,
        budget: Duration,
    ) -> Result<AgentCompletion, UpstreamError> {
        let limit = budget.min(self.config.timeout);
        let started_at = Instant::now();
        tracing::info!(
            event_name = "fallback.agent_invoked",
            session_id = %request.session_id,
            agent_id = %request.agent_id,
            agent_alias_id = %request.agent_alias_id,
            enable_trace = request.enable_trace,
            utterance_chars = request.utterance.chars().count(),
            timeout_ms = limit.as_millis() as u64,
            "invoking agent"
        );

        let completion = match tokio::time::timeout(limit, self.drain(request)).await {
            Ok(result) => result?,
            Err(_) => return Err(UpstreamError::Timeout(limit)),
        };

        tracing::info!(
            event_name = "fallback.agent_completed",
            session_id = %request.session_id,
            duration_ms = started_at.elapsed().as_millis() as u64,
            completion_chars = completion.text.chars().count(),
            citations = completion.citations.len(),
            traces = completion.traces.len(),
            "agent completed"
        );
        Ok(completion)
    }

    async fn drain(&self, request: &InvocationRequest) -> Result<AgentCompletion, UpstreamError> {
        let mut events = self.client.converse(request).await?;
        let mut completion = AgentCompletion::default();

        while let Some(event) = events.next().await {
            match event? {
                AgentEvent::Chunk { text, citations } => {
                    completion.text.push_str(&text);
                    completion.citations.extend(citations);
                }
                AgentEvent::Trace(trace) => {
                    if self.config.trace_enabled {
                        let label = completion.traces.record(&trace);
                        tracing::debug!(
                            event_name = "fallback.agent_trace",
                            session_id = %request.session_id,
                            trace_label = label,
                            detail = %trace.detail,
                            "agent trace"
                        );
                    }
                    if trace.is_terminal() {
                        return Err(UpstreamError::AgentFailure(trace.detail));
                    }
                }
            }
        }

        Ok(completion)
    }
}
