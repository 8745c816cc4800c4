use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use yaruki_core::config::BotConfig;
use yaruki_core::{ApplicationError, Clock, ScheduleError};
use yaruki_dify::{DifyError, WorkflowClient};

use crate::web_api::{SlackApi, SlackApiError};

/// A Socket Mode frame after the outer `type` has been inspected.
#[derive(Clone, Debug, PartialEq)]
pub enum SocketMessage {
    Hello,
    Disconnect { reason: Option<String> },
    Envelope(SlackEnvelope),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    Message(MessageEvent),
    Shortcut(ShortcutEvent),
    BlockActions(BlockActionsEvent),
    ViewSubmission(ViewSubmissionEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::Message(_) => SlackEventType::Message,
            Self::Shortcut(_) => SlackEventType::Shortcut,
            Self::BlockActions(_) => SlackEventType::BlockActions,
            Self::ViewSubmission(_) => SlackEventType::ViewSubmission,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    /// Dispatcher keys for this event. Block actions yield one route per
    /// action; messages that must not be answered yield none.
    pub fn routes(&self) -> Vec<Route> {
        match self {
            Self::SlashCommand(payload) => vec![Route::Command(payload.command.clone())],
            Self::Message(event) if event.is_user_message() => vec![Route::Message],
            Self::Message(_) => Vec::new(),
            Self::Shortcut(event) => vec![Route::Shortcut(event.callback_id.clone())],
            Self::BlockActions(event) => {
                event.actions.iter().map(|action| Route::Action(action.action_id.clone())).collect()
            }
            Self::ViewSubmission(event) => vec![Route::View(event.view.callback_id.clone())],
            Self::Unsupported { .. } => Vec::new(),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::SlashCommand(payload) => Some(&payload.user_id),
            Self::Message(event) => event.user_id.as_deref(),
            Self::Shortcut(event) => Some(&event.user_id),
            Self::BlockActions(event) => Some(&event.user_id),
            Self::ViewSubmission(event) => Some(&event.user_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    Message,
    Shortcut,
    BlockActions,
    ViewSubmission,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    Command(String),
    Shortcut(String),
    Action(String),
    View(String),
    Message,
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Command(name) => write!(f, "command:{name}"),
            Self::Shortcut(callback_id) => write!(f, "shortcut:{callback_id}"),
            Self::Action(action_id) => write!(f, "action:{action_id}"),
            Self::View(callback_id) => write!(f, "view:{callback_id}"),
            Self::Message => f.write_str("message"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SlashCommandPayload {
    pub command: String,
    #[serde(default)]
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    #[serde(default)]
    pub trigger_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MessageEvent {
    #[serde(rename = "channel")]
    pub channel_id: String,
    #[serde(rename = "user", default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
}

impl MessageEvent {
    /// Plain messages typed by a person. Bot posts (including our own
    /// replies), edits, joins and other subtypes are excluded.
    pub fn is_user_message(&self) -> bool {
        self.bot_id.is_none()
            && self.subtype.is_none()
            && self.user_id.as_deref().is_some_and(|user| !user.is_empty())
            && self.text.as_deref().is_some_and(|text| !text.trim().is_empty())
    }
}

/// Global shortcut or message shortcut invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShortcutEvent {
    pub callback_id: String,
    pub trigger_id: String,
    pub user_id: String,
    pub channel_id: Option<String>,
    /// Text of the message a message shortcut was invoked on.
    pub message_text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct BlockAction {
    pub action_id: String,
    #[serde(default)]
    pub block_id: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlockActionsEvent {
    pub user_id: String,
    pub trigger_id: Option<String>,
    pub actions: Vec<BlockAction>,
    pub view: Option<ViewPayload>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ViewSubmissionEvent {
    pub user_id: String,
    pub view: ViewPayload,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ViewPayload {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub callback_id: String,
    #[serde(default)]
    pub state: ViewState,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ViewState {
    #[serde(default)]
    pub values: HashMap<String, HashMap<String, Value>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedOption {
    pub text: String,
    pub description: String,
    pub value: String,
}

impl ViewState {
    fn field(&self, block_id: &str, action_id: &str, key: &str) -> Option<&Value> {
        self.values.get(block_id)?.get(action_id)?.get(key)
    }

    pub fn text_value(&self, block_id: &str, action_id: &str) -> Option<String> {
        self.field(block_id, action_id, "value").and_then(Value::as_str).map(str::to_owned)
    }

    pub fn selected_user(&self, block_id: &str, action_id: &str) -> Option<String> {
        self.field(block_id, action_id, "selected_user").and_then(Value::as_str).map(str::to_owned)
    }

    pub fn selected_options(&self, block_id: &str, action_id: &str) -> Vec<SelectedOption> {
        let Some(Value::Array(options)) = self.field(block_id, action_id, "selected_options")
        else {
            return Vec::new();
        };

        options
            .iter()
            .map(|option| {
                let nested_text = |key: &str| {
                    option
                        .get(key)
                        .and_then(|object| object.get("text"))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_owned()
                };
                SelectedOption {
                    text: nested_text("text"),
                    description: nested_text("description"),
                    value: option.get("value").and_then(Value::as_str).unwrap_or_default().to_owned(),
                }
            })
            .collect()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeParseError {
    #[error("socket frame is not valid JSON: {0}")]
    InvalidJson(String),
}

#[derive(Deserialize)]
struct RawSocketMessage {
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct RawEventsApiPayload {
    event: Value,
}

#[derive(Deserialize)]
struct RawId {
    id: String,
}

#[derive(Deserialize)]
struct RawMessageRef {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct RawInteractive {
    #[serde(rename = "type")]
    interaction_type: String,
    #[serde(default)]
    callback_id: Option<String>,
    #[serde(default)]
    trigger_id: Option<String>,
    user: RawId,
    #[serde(default)]
    channel: Option<RawId>,
    #[serde(default)]
    message: Option<RawMessageRef>,
    #[serde(default)]
    actions: Vec<BlockAction>,
    #[serde(default)]
    view: Option<ViewPayload>,
}

/// Parses one Socket Mode text frame. Frames that cannot be acted on
/// (unknown types, envelopes without an id) yield `Ok(None)`.
pub fn parse_socket_message(text: &str) -> Result<Option<SocketMessage>, EnvelopeParseError> {
    let raw: RawSocketMessage = serde_json::from_str(text)
        .map_err(|error| EnvelopeParseError::InvalidJson(error.to_string()))?;

    match raw.message_type.as_str() {
        "hello" => {
            debug!(event_name = "ingress.slack.hello", "socket mode hello received");
            Ok(Some(SocketMessage::Hello))
        }
        "disconnect" => Ok(Some(SocketMessage::Disconnect { reason: raw.reason })),
        "slash_commands" | "events_api" | "interactive" => {
            let Some(envelope_id) = raw.envelope_id.filter(|id| !id.is_empty()) else {
                warn!(
                    event_name = "ingress.slack.envelope_skipped",
                    envelope_type = %raw.message_type,
                    "envelope without envelope_id skipped"
                );
                return Ok(None);
            };
            let payload = raw.payload.unwrap_or(Value::Null);
            let event = parse_event(&raw.message_type, payload);
            Ok(Some(SocketMessage::Envelope(SlackEnvelope { envelope_id, event })))
        }
        other => {
            warn!(
                event_name = "ingress.slack.envelope_skipped",
                envelope_type = %other,
                "unknown socket mode message type skipped"
            );
            Ok(None)
        }
    }
}

fn parse_event(envelope_type: &str, payload: Value) -> SlackEvent {
    let parsed = match envelope_type {
        "slash_commands" => serde_json::from_value(payload).map(SlackEvent::SlashCommand),
        "events_api" => serde_json::from_value::<RawEventsApiPayload>(payload).map(parse_events_api),
        _ => serde_json::from_value::<RawInteractive>(payload).map(parse_interactive),
    };

    parsed.unwrap_or_else(|error| {
        warn!(
            event_name = "ingress.slack.payload_malformed",
            envelope_type,
            error = %error,
            "envelope payload could not be decoded"
        );
        SlackEvent::Unsupported { event_type: format!("{envelope_type}:malformed") }
    })
}

fn parse_events_api(payload: RawEventsApiPayload) -> SlackEvent {
    let event_type = payload.event.get("type").and_then(Value::as_str).unwrap_or("unknown").to_owned();
    if event_type != "message" {
        return SlackEvent::Unsupported { event_type };
    }

    match serde_json::from_value::<MessageEvent>(payload.event) {
        Ok(event) => SlackEvent::Message(event),
        Err(_) => SlackEvent::Unsupported { event_type: "message:malformed".to_owned() },
    }
}

fn parse_interactive(payload: RawInteractive) -> SlackEvent {
    match payload.interaction_type.as_str() {
        "shortcut" | "message_action" => SlackEvent::Shortcut(ShortcutEvent {
            callback_id: payload.callback_id.unwrap_or_default(),
            trigger_id: payload.trigger_id.unwrap_or_default(),
            user_id: payload.user.id,
            channel_id: payload.channel.map(|channel| channel.id),
            message_text: payload.message.and_then(|message| message.text),
        }),
        "block_actions" => SlackEvent::BlockActions(BlockActionsEvent {
            user_id: payload.user.id,
            trigger_id: payload.trigger_id,
            actions: payload.actions,
            view: payload.view,
        }),
        "view_submission" => SlackEvent::ViewSubmission(ViewSubmissionEvent {
            user_id: payload.user.id,
            view: payload.view.unwrap_or_default(),
        }),
        other => SlackEvent::Unsupported { event_type: other.to_owned() },
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Slack(#[from] SlackApiError),
    #[error(transparent)]
    Workflow(#[from] DifyError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("payload for `{route}` is missing {detail}")]
    InvalidPayload { route: String, detail: String },
}

impl From<EventHandlerError> for ApplicationError {
    fn from(value: EventHandlerError) -> Self {
        match value {
            EventHandlerError::Slack(error) => error.into(),
            EventHandlerError::Workflow(error) => error.into(),
            EventHandlerError::Schedule(error) => Self::InvalidInput(error.to_string()),
            error @ EventHandlerError::InvalidPayload { .. } => Self::InvalidInput(error.to_string()),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("handler for `{route}` failed: {source}")]
    Handler {
        route: String,
        #[source]
        source: EventHandlerError,
    },
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn routes(&self) -> Vec<Route>;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        route: &Route,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<Route, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        let handler: Arc<dyn EventHandler> = Arc::new(handler);
        for route in handler.routes() {
            self.handlers.insert(route, Arc::clone(&handler));
        }
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let mut result = HandlerResult::Ignored;
        for route in envelope.event.routes() {
            let Some(handler) = self.handlers.get(&route) else {
                debug!(
                    event_name = "ingress.slack.unrouted",
                    route = %route,
                    correlation_id = %ctx.correlation_id,
                    "no handler registered for route"
                );
                continue;
            };

            let outcome = handler.handle(envelope, &route, ctx).await.map_err(|source| {
                DispatchError::Handler { route: route.to_string(), source }
            })?;
            if outcome == HandlerResult::Processed {
                result = HandlerResult::Processed;
            }
        }
        Ok(result)
    }

    pub fn handles(&self, route: &Route) -> bool {
        self.handlers.contains_key(route)
    }

    pub fn route_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Shared dependencies handed to every handler.
#[derive(Clone)]
pub struct BotServices {
    pub slack: Arc<dyn SlackApi>,
    pub workflows: Arc<dyn WorkflowClient>,
    pub clock: Arc<dyn Clock>,
    pub bot: Arc<BotConfig>,
}

pub fn bot_dispatcher(services: BotServices) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(crate::commands::AssistantCommandHandler::new(services.clone()));
    dispatcher.register(crate::commands::ReminderCommandHandler::new(services.clone()));
    dispatcher.register(crate::commands::LoggedCommandHandler);
    dispatcher.register(crate::softener::SoftenerHandler::new(services.clone()));
    dispatcher.register(crate::tasks::TaskManagerHandler::new(services.clone()));
    dispatcher.register(crate::messages::MessageRelayHandler::new(services));
    dispatcher
}
