use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use paybot_core::{ApplicationError, DomainError, UserId};
use serde_json::Value;
use thiserror::Error;

use crate::{
    blocks::{self, HomeView, MessageTemplate},
    commands::{
        normalize_form_command, CommandParseError, CommandRouteError, CommandRouter,
        FormCommandService, SlashCommandPayload,
    },
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    DirectMessage(MessageEvent),
    AppHomeOpened { user_id: String },
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::DirectMessage(_) => SlackEventType::DirectMessage,
            Self::AppHomeOpened { .. } => SlackEventType::AppHomeOpened,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    /// Channel a reply to this event belongs in.
    pub fn reply_channel(&self) -> Option<&str> {
        match self {
            Self::SlashCommand(payload) => Some(&payload.channel_id),
            Self::DirectMessage(message) => Some(&message.channel_id),
            Self::AppHomeOpened { .. } | Self::Unsupported { .. } => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::SlashCommand(payload) => Some(&payload.user_id),
            Self::DirectMessage(message) => Some(&message.user_id),
            Self::AppHomeOpened { user_id } => Some(user_id),
            Self::Unsupported { .. } => None,
        }
    }

    /// Maps the inner `event` object of an Events API callback.
    ///
    /// Messages from bots (including this one) and message subtypes such as edits are
    /// reported as unsupported so they never re-enter the questionnaire.
    pub fn from_event_callback(event: &Value) -> Self {
        let event_type = str_field(event, "type").unwrap_or("unknown");
        match event_type {
            "message" => {
                if event.get("bot_id").is_some() {
                    return unsupported("message.bot");
                }
                if let Some(subtype) = str_field(event, "subtype") {
                    return unsupported(&format!("message.{subtype}"));
                }
                if str_field(event, "channel_type") != Some("im") {
                    return unsupported("message.channel");
                }
                message_event(event, MessageKind::Direct, |text| text.to_owned())
            }
            "app_mention" => {
                if event.get("bot_id").is_some() {
                    return unsupported("app_mention.bot");
                }
                message_event(event, MessageKind::Mention, strip_leading_mention)
            }
            "app_home_opened" => {
                // the Messages tab fires this event too
                if str_field(event, "tab").is_some_and(|tab| tab != "home") {
                    return unsupported("app_home_opened.messages");
                }
                match str_field(event, "user") {
                    Some(user_id) => Self::AppHomeOpened { user_id: user_id.to_owned() },
                    None => unsupported(event_type),
                }
            }
            other => unsupported(other),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    DirectMessage,
    AppHomeOpened,
    Unsupported,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Direct,
    Mention,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
    pub ts: String,
    pub kind: MessageKind,
}

fn str_field<'a>(value: &'a Value, name: &str) -> Option<&'a str> {
    value.get(name).and_then(Value::as_str)
}

fn unsupported(event_type: &str) -> SlackEvent {
    SlackEvent::Unsupported { event_type: event_type.to_owned() }
}

fn message_event(event: &Value, kind: MessageKind, text: impl Fn(&str) -> String) -> SlackEvent {
    let (Some(channel_id), Some(user_id)) = (str_field(event, "channel"), str_field(event, "user"))
    else {
        return unsupported("message.incomplete");
    };

    SlackEvent::DirectMessage(MessageEvent {
        channel_id: channel_id.to_owned(),
        user_id: user_id.to_owned(),
        text: text(str_field(event, "text").unwrap_or_default()),
        ts: str_field(event, "ts").unwrap_or_default().to_owned(),
        kind,
    })
}

/// Drops a leading `<@U123>` so that "@paybot yes" reads as "yes".
pub fn strip_leading_mention(text: &str) -> String {
    let trimmed = text.trim_start();
    if trimmed.starts_with("<@") {
        if let Some(end) = trimmed.find('>') {
            return trimmed[end + 1..].trim().to_owned();
        }
    }
    trimmed.trim_end().to_owned()
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
    Responded(MessageTemplate),
    PublishHome { user_id: String, view: HomeView },
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Parse(#[from] CommandParseError),
    #[error(transparent)]
    Route(#[from] CommandRouteError),
    #[error(transparent)]
    Message(#[from] ApplicationError),
}

impl EventHandlerError {
    /// The application-layer cause, if any, for mapping into a user-facing message.
    pub fn into_application(self) -> ApplicationError {
        match self {
            Self::Parse(error) => DomainError::InvariantViolation(error.to_string()).into(),
            Self::Route(CommandRouteError::Service(error)) | Self::Message(error) => error,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Wires one conversation service into every handler the bot serves.
pub fn form_dispatcher<S>(service: S) -> EventDispatcher
where
    S: FormCommandService + MessageService + Clone + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(service.clone()));
    dispatcher.register(MessageHandler::new(service));
    dispatcher.register(AppHomeHandler);
    dispatcher
}

pub struct SlashCommandHandler<S> {
    router: CommandRouter<S>,
}

impl<S> SlashCommandHandler<S>
where
    S: FormCommandService,
{
    pub fn new(service: S) -> Self {
        Self { router: CommandRouter::new(service) }
    }
}

#[async_trait]
impl<S> EventHandler for SlashCommandHandler<S>
where
    S: FormCommandService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let normalized = normalize_form_command(payload.clone())?;
        let message = self.router.route(normalized).await?;
        Ok(HandlerResult::Responded(message))
    }
}

#[async_trait]
pub trait MessageService: Send + Sync {
    async fn handle_message(
        &self,
        user_id: &UserId,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, ApplicationError>;
}

pub struct MessageHandler<S> {
    service: S,
}

impl<S> MessageHandler<S>
where
    S: MessageService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for MessageHandler<S>
where
    S: MessageService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::DirectMessage
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::DirectMessage(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let user_id = UserId(event.user_id.clone());
        let message = self.service.handle_message(&user_id, event, ctx).await?;
        Ok(match message {
            Some(message) => HandlerResult::Responded(message),
            None => HandlerResult::Processed,
        })
    }
}

pub struct AppHomeHandler;

#[async_trait]
impl EventHandler for AppHomeHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::AppHomeOpened
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::AppHomeOpened { user_id } = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        Ok(HandlerResult::PublishHome { user_id: user_id.clone(), view: blocks::home_view() })
    }
}
