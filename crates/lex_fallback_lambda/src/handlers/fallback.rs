use std::time::{Duration, SystemTime, UNIX_EPOCH};

use lambda_runtime::LambdaEvent;
use lex_fallback_core::agent::AgentClient;
use lex_fallback_core::contract::{LexEvent, ReplyEnvelope};
use lex_fallback_core::dispatcher::FallbackDispatcher;
use serde_json::Value;
use tracing::Instrument;

/// Time kept back from the invocation deadline to serialize and return the
/// apology.
pub const DEADLINE_MARGIN: Duration = Duration::from_secs(2);

/// Runtime entry point. Runs under a span tagged with the Lambda request id
/// and never waits on the agent past the invocation deadline.
pub async fn handle_lambda_event<C: AgentClient>(
    event: LambdaEvent<Value>,
    dispatcher: &FallbackDispatcher<C>,
) -> ReplyEnvelope {
    let span = tracing::info_span!("fallback", request_id = %event.context.request_id);
    let budget = remaining_budget(event.context.deadline, SystemTime::now())
        .unwrap_or(dispatcher.config().timeout);

    respond(event.payload, dispatcher, budget)
        .instrument(span)
        .await
}

/// Time left before `deadline_ms` (milliseconds since the epoch) minus
/// [`DEADLINE_MARGIN`]. `None` when the runtime supplied no deadline.
pub fn remaining_budget(deadline_ms: u64, now: SystemTime) -> Option<Duration> {
    if deadline_ms == 0 {
        return None;
    }
    let deadline = UNIX_EPOCH + Duration::from_millis(deadline_ms);
    let left = deadline.duration_since(now).unwrap_or_default();
    Some(left.saturating_sub(DEADLINE_MARGIN))
}

/// Entry point for a Lex V2 fallback code-hook invocation. Never fails: an
/// undecodable payload still gets a closed reply so the bot can answer.
pub async fn handle_fallback_event<C: AgentClient>(
    event: Value,
    dispatcher: &FallbackDispatcher<C>,
) -> ReplyEnvelope {
    respond(event, dispatcher, dispatcher.config().timeout).await
}

async fn respond<C: AgentClient>(
    event: Value,
    dispatcher: &FallbackDispatcher<C>,
    budget: Duration,
) -> ReplyEnvelope {
    let lex_event = match LexEvent::from_value(event) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(
                event_name = "fallback.event_malformed",
                error = %error,
                "fallback payload is not a Lex event"
            );
            return ReplyEnvelope::failed(
                &LexEvent::default(),
                dispatcher.config().processing_apology.clone(),
            );
        }
    };

    tracing::info!(
        event_name = "fallback.event_received",
        session_id = %lex_event.session_id,
        bot_name = lex_event.bot_name().unwrap_or("unknown"),
        invocation_source = lex_event.invocation_source.as_deref().unwrap_or("unknown"),
        input_mode = lex_event.input_mode.as_deref().unwrap_or("unknown"),
        intent_name = lex_event.intent_name(),
        budget_ms = budget.as_millis() as u64,
        "fallback event received"
    );

    dispatcher.dispatch_within(&lex_event, budget).await
}
