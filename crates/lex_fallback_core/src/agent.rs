use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::contract::InvocationRequest;
use crate::error::UpstreamError;
use crate::trace::{TraceEvent, TraceLog};

/// Knowledge-base attribution attached to part of a completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Citation {
    pub generated_text: Option<String>,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    Chunk {
        text: String,
        citations: Vec<Citation>,
    },
    Trace(TraceEvent),
}

impl AgentEvent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Chunk {
            text: text.into(),
            citations: Vec::new(),
        }
    }
}

/// Lazily produced agent output. End of stream means the agent completed;
/// dropping the stream abandons the call.
pub type AgentEventStream = BoxStream<'static, Result<AgentEvent, UpstreamError>>;

/// Generative agent conversation service.
#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn converse(
        &self,
        request: &InvocationRequest,
    ) -> Result<AgentEventStream, UpstreamError>;
}

#[async_trait]
impl<T: AgentClient + ?Sized> AgentClient for std::sync::Arc<T> {
    async fn converse(
        &self,
        request: &InvocationRequest,
    ) -> Result<AgentEventStream, UpstreamError> {
        (**self).converse(request).await
    }
}

/// Drained result of one conversation turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentCompletion {
    pub text: String,
    pub citations: Vec<Citation>,
    pub traces: TraceLog,
}
