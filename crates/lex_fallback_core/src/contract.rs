//! Lex V2 code-hook wire contracts.
//!
//! Field names follow the Lex V2 Lambda input/output format. Anything the
//! dispatcher does not interpret is carried through untouched so the bot's
//! session survives the fallback turn.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::DispatcherConfig;
use crate::error::EventError;

pub const FALLBACK_INTENT_NAME: &str = "FallbackIntent";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LexEvent {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub input_transcript: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<LexBot>,
    #[serde(default)]
    pub session_state: LexSessionState,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LexBot {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LexSessionState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_attributes: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_contexts: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<LexIntent>,
    /// Session-state fields Lex sends that the fallback does not inspect,
    /// such as `originatingRequestId`. Echoed back on the reply.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LexIntent {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_state: Option<String>,
}

impl LexEvent {
    pub fn from_value(value: Value) -> Result<Self, EventError> {
        serde_json::from_value(value).map_err(|error| EventError::Decode(error.to_string()))
    }

    pub fn bot_name(&self) -> Option<&str> {
        self.bot.as_ref().map(|bot| bot.name.as_str())
    }

    /// Name of the intent being answered, defaulting to the fallback intent.
    pub fn intent_name(&self) -> &str {
        self.session_state
            .intent
            .as_ref()
            .map(|intent| intent.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(FALLBACK_INTENT_NAME)
    }
}

/// One conversation turn forwarded to the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    pub session_id: String,
    pub utterance: String,
    pub agent_id: String,
    pub agent_alias_id: String,
    pub enable_trace: bool,
}

impl InvocationRequest {
    /// Builds the agent request for `event`. The utterance is forwarded
    /// verbatim, including when it is empty.
    pub fn from_event(event: &LexEvent, config: &DispatcherConfig) -> Result<Self, EventError> {
        if event.session_id.trim().is_empty() {
            return Err(EventError::MissingSessionId);
        }
        Ok(Self {
            session_id: event.session_id.clone(),
            utterance: event.input_transcript.clone(),
            agent_id: config.agent_id.clone(),
            agent_alias_id: config.agent_alias_id.clone(),
            enable_trace: config.trace_enabled,
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DialogActionType {
    Close,
    ConfirmIntent,
    Delegate,
    ElicitIntent,
    ElicitSlot,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IntentState {
    Fulfilled,
    Failed,
    InProgress,
    ReadyForFulfillment,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ContentType {
    PlainText,
    #[serde(rename = "SSML")]
    Ssml,
    CustomPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DialogAction {
    #[serde(rename = "type")]
    pub action_type: DialogActionType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplyIntent {
    pub name: String,
    pub state: IntentState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplySessionState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_attributes: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_contexts: Option<Value>,
    pub dialog_action: DialogAction,
    pub intent: ReplyIntent,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReplyMessage {
    pub content_type: ContentType,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplyEnvelope {
    pub session_state: ReplySessionState,
    pub messages: Vec<ReplyMessage>,
}

impl ReplyEnvelope {
    /// Closes the turn with a single plain-text message.
    pub fn close(event: &LexEvent, state: IntentState, content: impl Into<String>) -> Self {
        let incoming = &event.session_state;
        Self {
            session_state: ReplySessionState {
                session_attributes: incoming.session_attributes.clone(),
                active_contexts: incoming.active_contexts.clone(),
                dialog_action: DialogAction {
                    action_type: DialogActionType::Close,
                },
                intent: ReplyIntent {
                    name: event.intent_name().to_string(),
                    state,
                    slots: incoming
                        .intent
                        .as_ref()
                        .and_then(|intent| intent.slots.clone()),
                },
                extra: incoming
                    .extra
                    .iter()
                    .filter(|(key, _)| key.as_str() != "dialogAction")
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            },
            messages: vec![ReplyMessage {
                content_type: ContentType::PlainText,
                content: content.into(),
            }],
        }
    }

    pub fn fulfilled(event: &LexEvent, content: impl Into<String>) -> Self {
        Self::close(event, IntentState::Fulfilled, content)
    }

    pub fn failed(event: &LexEvent, content: impl Into<String>) -> Self {
        Self::close(event, IntentState::Failed, content)
    }

    pub fn dialog_action(&self) -> DialogActionType {
        self.session_state.dialog_action.action_type
    }
}
