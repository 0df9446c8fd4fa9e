use lambda_runtime::{service_fn, Error, LambdaEvent};
use lex_fallback_core::contract::ReplyEnvelope;
use lex_fallback_core::dispatcher::FallbackDispatcher;
use lex_fallback_lambda::adapters::bedrock::BedrockAgentClient;
use lex_fallback_lambda::config::RuntimeConfig;
use lex_fallback_lambda::handlers::fallback::handle_lambda_event;
use lex_fallback_lambda::logging::init_logging;
use serde_json::Value;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = RuntimeConfig::from_env()?;
    init_logging(&config.logging);

    tracing::info!(
        event_name = "fallback.cold_start",
        agent_id = %config.dispatcher.agent_id,
        agent_alias_id = %config.dispatcher.agent_alias_id,
        trace_enabled = config.dispatcher.trace_enabled,
        timeout_secs = config.dispatcher.timeout.as_secs(),
        "fallback lambda starting"
    );

    let client = BedrockAgentClient::from_env(config.dispatcher.timeout).await;
    let dispatcher = FallbackDispatcher::new(config.dispatcher, client)?;
    let dispatcher = &dispatcher;

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        Ok::<ReplyEnvelope, Error>(handle_lambda_event(event, dispatcher).await)
    }))
    .await
}
