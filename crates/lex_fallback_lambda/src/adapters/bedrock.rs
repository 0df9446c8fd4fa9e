use std::time::Duration;

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_bedrockagentruntime::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_bedrockagentruntime::types::{
    Attribution, OrchestrationTrace, PostProcessingTrace, PreProcessingTrace, ResponseStream,
    Trace,
};
use futures::stream::{self, StreamExt};
use lex_fallback_core::agent::{AgentClient, AgentEvent, AgentEventStream, Citation};
use lex_fallback_core::contract::InvocationRequest;
use lex_fallback_core::error::UpstreamError;
use lex_fallback_core::trace::{TraceEvent, TraceKind};
use serde_json::{json, Value};

const THROTTLING_CODES: &[&str] = &[
    "ThrottlingException",
    "TooManyRequestsException",
    "ServiceQuotaExceededException",
];

/// Bedrock Agent Runtime `InvokeAgent` behind the [`AgentClient`] seam.
#[derive(Clone)]
pub struct BedrockAgentClient {
    client: aws_sdk_bedrockagentruntime::Client,
}

impl BedrockAgentClient {
    pub fn new(client: aws_sdk_bedrockagentruntime::Client) -> Self {
        Self { client }
    }

    /// Loads the default AWS configuration chain. A single attempt is made per
    /// turn, so SDK retries are disabled.
    pub async fn from_env(read_timeout: Duration) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .retry_config(RetryConfig::disabled())
            .timeout_config(
                TimeoutConfig::builder()
                    .read_timeout(read_timeout)
                    .build(),
            )
            .load()
            .await;
        Self::new(aws_sdk_bedrockagentruntime::Client::new(&sdk_config))
    }
}

#[async_trait]
impl AgentClient for BedrockAgentClient {
    async fn converse(
        &self,
        request: &InvocationRequest,
    ) -> Result<AgentEventStream, UpstreamError> {
        let output = self
            .client
            .invoke_agent()
            .agent_id(&request.agent_id)
            .agent_alias_id(&request.agent_alias_id)
            .session_id(&request.session_id)
            .input_text(&request.utterance)
            .enable_trace(request.enable_trace)
            .send()
            .await
            .map_err(classify_sdk_error)?;

        let events = stream::unfold(Some(output.completion), |receiver| async move {
            let mut receiver = receiver?;
            loop {
                match receiver.recv().await {
                    Ok(Some(event)) => match map_response_event(event) {
                        Ok(Some(mapped)) => return Some((Ok(mapped), Some(receiver))),
                        Ok(None) => continue,
                        Err(error) => return Some((Err(error), None)),
                    },
                    Ok(None) => return None,
                    Err(error) => return Some((Err(classify_sdk_error(error)), None)),
                }
            }
        });
        Ok(events.boxed())
    }
}

/// Translates one stream member. Members the dispatcher has no use for
/// (return-control requests, files) map to `None`.
pub fn map_response_event(event: ResponseStream) -> Result<Option<AgentEvent>, UpstreamError> {
    match event {
        ResponseStream::Chunk(part) => {
            let text = match part.bytes() {
                Some(bytes) => std::str::from_utf8(bytes.as_ref())
                    .map_err(|error| {
                        UpstreamError::MalformedResponse(format!(
                            "completion chunk is not valid UTF-8: {error}"
                        ))
                    })?
                    .to_string(),
                None => String::new(),
            };
            let citations = part.attribution().map(map_citations).unwrap_or_default();
            Ok(Some(AgentEvent::Chunk { text, citations }))
        }
        ResponseStream::Trace(part) => Ok(part
            .trace()
            .map(|trace| AgentEvent::Trace(classify_trace(trace)))),
        _ => Ok(None),
    }
}

fn map_citations(attribution: &Attribution) -> Vec<Citation> {
    attribution
        .citations()
        .iter()
        .map(|citation| Citation {
            generated_text: citation
                .generated_response_part()
                .and_then(|part| part.text_response_part())
                .and_then(|part| part.text())
                .map(str::to_string),
            sources: citation
                .retrieved_references()
                .iter()
                .filter_map(|reference| reference.location())
                .filter_map(|location| location.s3_location())
                .filter_map(|s3| s3.uri())
                .map(str::to_string)
                .collect(),
        })
        .collect()
}

/// Classifies a trace and renders the fields worth logging as a JSON object.
/// The SDK redacts `Trace` in its `Debug` output, so fields are read one by one.
pub fn classify_trace(trace: &Trace) -> TraceEvent {
    let (kind, detail) = match trace {
        Trace::FailureTrace(failure) => {
            return TraceEvent::new(
                TraceKind::Failure,
                failure
                    .failure_reason()
                    .unwrap_or("agent emitted a failure trace without a reason"),
            );
        }
        Trace::GuardrailTrace(guardrail) => (
            TraceKind::Guardrail,
            json!({
                "traceId": guardrail.trace_id(),
                "action": guardrail.action().map(|action| action.as_str()),
            }),
        ),
        Trace::PreProcessingTrace(pre) => (TraceKind::PreProcessing, pre_processing_detail(pre)),
        Trace::OrchestrationTrace(step) => (TraceKind::Orchestration, orchestration_detail(step)),
        Trace::PostProcessingTrace(post) => {
            (TraceKind::PostProcessing, post_processing_detail(post))
        }
        _ => (TraceKind::Other, json!({ "step": "unrecognized" })),
    };
    TraceEvent::new(kind, without_nulls(detail).to_string())
}

fn orchestration_detail(step: &OrchestrationTrace) -> Value {
    match step {
        OrchestrationTrace::Rationale(rationale) => json!({
            "step": "rationale",
            "traceId": rationale.trace_id(),
            "text": rationale.text(),
        }),
        OrchestrationTrace::InvocationInput(input) => json!({
            "step": "invocationInput",
            "traceId": input.trace_id(),
            "invocationType": input.invocation_type().map(|kind| kind.as_str()),
            "actionGroup": input
                .action_group_invocation_input()
                .and_then(|action| action.action_group_name()),
            "apiPath": input
                .action_group_invocation_input()
                .and_then(|action| action.api_path()),
            "function": input
                .action_group_invocation_input()
                .and_then(|action| action.function()),
            "knowledgeBaseQuery": input
                .knowledge_base_lookup_input()
                .and_then(|lookup| lookup.text()),
        }),
        OrchestrationTrace::Observation(observation) => json!({
            "step": "observation",
            "traceId": observation.trace_id(),
            "type": observation.r#type().map(|kind| kind.as_str()),
            "actionGroupOutput": observation
                .action_group_invocation_output()
                .and_then(|output| output.text()),
            "finalResponse": observation
                .final_response()
                .and_then(|response| response.text()),
        }),
        OrchestrationTrace::ModelInvocationOutput(output) => json!({
            "step": "modelInvocationOutput",
            "traceId": output.trace_id(),
            "rawResponse": output.raw_response().and_then(|raw| raw.content()),
        }),
        OrchestrationTrace::ModelInvocationInput(_) => json!({ "step": "modelInvocationInput" }),
        _ => json!({ "step": "unrecognized" }),
    }
}

fn pre_processing_detail(step: &PreProcessingTrace) -> Value {
    match step {
        PreProcessingTrace::ModelInvocationOutput(output) => json!({
            "step": "modelInvocationOutput",
            "traceId": output.trace_id(),
            "rationale": output.parsed_response().and_then(|parsed| parsed.rationale()),
            "isValid": output.parsed_response().and_then(|parsed| parsed.is_valid()),
        }),
        PreProcessingTrace::ModelInvocationInput(_) => json!({ "step": "modelInvocationInput" }),
        _ => json!({ "step": "unrecognized" }),
    }
}

fn post_processing_detail(step: &PostProcessingTrace) -> Value {
    match step {
        PostProcessingTrace::ModelInvocationOutput(output) => json!({
            "step": "modelInvocationOutput",
            "traceId": output.trace_id(),
            "text": output.parsed_response().and_then(|parsed| parsed.text()),
        }),
        PostProcessingTrace::ModelInvocationInput(_) => json!({ "step": "modelInvocationInput" }),
        _ => json!({ "step": "unrecognized" }),
    }
}

fn without_nulls(mut detail: Value) -> Value {
    if let Value::Object(fields) = &mut detail {
        fields.retain(|_, value| !value.is_null());
    }
    detail
}

pub fn classify_sdk_error<E, R>(error: SdkError<E, R>) -> UpstreamError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let detail = DisplayErrorContext(&error).to_string();
    match &error {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            UpstreamError::Transport(detail)
        }
        SdkError::ResponseError(_) => UpstreamError::MalformedResponse(detail),
        SdkError::ServiceError(_)
            if error
                .code()
                .is_some_and(|code| THROTTLING_CODES.contains(&code)) =>
        {
            UpstreamError::Throttled(detail)
        }
        _ => UpstreamError::Service(detail),
    }
}

#[cfg(test)]
mod tests {
    use aws_sdk_bedrockagentruntime::error::ErrorMetadata;
    use aws_sdk_bedrockagentruntime::operation::invoke_agent::InvokeAgentError;
    use aws_sdk_bedrockagentruntime::primitives::Blob;
    use aws_sdk_bedrockagentruntime::types::error::ThrottlingException;
    use aws_sdk_bedrockagentruntime::types::{
        Citation as SdkCitation, FailureTrace, GuardrailAction, GuardrailTrace, PayloadPart,
        Rationale, RetrievalResultLocation, RetrievalResultLocationType,
        RetrievalResultS3Location, RetrievedReference, ReturnControlPayload, TracePart,
    };

    use super::*;

    #[test]
    fn maps_chunk_bytes_to_text() {
        let event =
            ResponseStream::Chunk(PayloadPart::builder().bytes(Blob::new("Hello, ")).build());

        let mapped = map_response_event(event).expect("chunk should map");

        assert_eq!(mapped, Some(AgentEvent::text("Hello, ")));
    }

    #[test]
    fn rejects_invalid_utf8_chunk() {
        let event = ResponseStream::Chunk(
            PayloadPart::builder()
                .bytes(Blob::new(vec![0xff, 0xfe]))
                .build(),
        );

        let error = map_response_event(event).expect_err("invalid UTF-8 should fail");

        assert!(matches!(error, UpstreamError::MalformedResponse(_)));
    }

    #[test]
    fn failure_trace_carries_reason() {
        let trace = Trace::FailureTrace(
            FailureTrace::builder()
                .failure_reason("Lambda action group timed out")
                .build(),
        );
        let event = ResponseStream::Trace(TracePart::builder().trace(trace).build());

        let mapped = map_response_event(event).expect("trace should map");

        assert_eq!(
            mapped,
            Some(AgentEvent::Trace(TraceEvent::new(
                TraceKind::Failure,
                "Lambda action group timed out"
            )))
        );
    }

    #[test]
    fn trace_part_without_trace_is_skipped() {
        let event = ResponseStream::Trace(TracePart::builder().build());
        assert_eq!(map_response_event(event).expect("trace should map"), None);
    }

    #[test]
    fn sdk_timeout_is_a_transport_error() {
        let error: SdkError<InvokeAgentError, ()> = SdkError::timeout_error("read timed out");

        assert!(matches!(
            classify_sdk_error(error),
            UpstreamError::Transport(_)
        ));
    }

    #[test]
    fn rationale_text_reaches_trace_detail() {
        let trace = Trace::OrchestrationTrace(OrchestrationTrace::Rationale(
            Rationale::builder()
                .text("User asks about books; call gutendex")
                .build(),
        ));

        let event = classify_trace(&trace);

        assert_eq!(event.kind, TraceKind::Orchestration);
        let detail: Value = serde_json::from_str(&event.detail).expect("detail should be JSON");
        assert_eq!(detail["step"], "rationale");
        assert_eq!(detail["text"], "User asks about books; call gutendex");
        assert!(detail.get("traceId").is_none());
    }

    #[test]
    fn guardrail_trace_reports_action() {
        let trace = Trace::GuardrailTrace(
            GuardrailTrace::builder()
                .action(GuardrailAction::Intervened)
                .trace_id("t-1")
                .build(),
        );

        let event = classify_trace(&trace);

        assert_eq!(event.kind, TraceKind::Guardrail);
        let detail: Value = serde_json::from_str(&event.detail).expect("detail should be JSON");
        assert_eq!(detail["action"], "INTERVENED");
        assert_eq!(detail["traceId"], "t-1");
    }

    #[test]
    fn attribution_becomes_citation_sources() {
        let location = RetrievalResultLocation::builder()
            .r#type(RetrievalResultLocationType::S3)
            .s3_location(
                RetrievalResultS3Location::builder()
                    .uri("s3://kb/a.txt")
                    .build(),
            )
            .build()
            .expect("location type is set");
        let attribution = Attribution::builder()
            .citations(
                SdkCitation::builder()
                    .retrieved_references(RetrievedReference::builder().location(location).build())
                    .build(),
            )
            .build();
        let event = ResponseStream::Chunk(
            PayloadPart::builder()
                .bytes(Blob::new("Moby Dick is available."))
                .attribution(attribution)
                .build(),
        );

        let mapped = map_response_event(event).expect("chunk should map");

        assert_eq!(
            mapped,
            Some(AgentEvent::Chunk {
                text: "Moby Dick is available.".to_string(),
                citations: vec![Citation {
                    generated_text: None,
                    sources: vec!["s3://kb/a.txt".to_string()],
                }],
            })
        );
    }

    #[test]
    fn return_control_is_skipped() {
        let event = ResponseStream::ReturnControl(
            ReturnControlPayload::builder().invocation_id("inv-1").build(),
        );
        assert_eq!(map_response_event(event).expect("member should map"), None);
    }

    #[test]
    fn throttling_service_error_is_throttled() {
        let error = SdkError::service_error(
            InvokeAgentError::ThrottlingException(
                ThrottlingException::builder()
                    .message("slow down")
                    .meta(ErrorMetadata::builder().code("ThrottlingException").build())
                    .build(),
            ),
            (),
        );

        assert!(matches!(
            classify_sdk_error(error),
            UpstreamError::Throttled(_)
        ));
    }

    #[test]
    fn other_service_error_is_a_service_error() {
        let error = SdkError::service_error(
            InvokeAgentError::generic(
                ErrorMetadata::builder()
                    .code("InternalServerException")
                    .message("agent crashed")
                    .build(),
            ),
            (),
        );

        assert!(matches!(
            classify_sdk_error(error),
            UpstreamError::Service(_)
        ));
    }

    #[test]
    fn unparseable_response_is_malformed() {
        let error: SdkError<InvokeAgentError, ()> =
            SdkError::response_error("unexpected end of event stream", ());

        assert!(matches!(
            classify_sdk_error(error),
            UpstreamError::MalformedResponse(_)
        ));
    }
}
