use async_trait::async_trait;
use paybot_core::{ApplicationError, UserId};
use serde_json::Value;
use thiserror::Error;

use crate::blocks::MessageTemplate;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    pub trigger_id: String,
    pub request_id: String,
}

impl SlashCommandPayload {
    /// Reads the fields Slack sends for a slash command. Socket Mode delivers them as a
    /// JSON object; the HTTP endpoint delivers a form that is decoded into the same shape.
    pub fn from_json(payload: &Value, request_id: impl Into<String>) -> Result<Self, CommandParseError> {
        let field = |name: &'static str| {
            payload
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or(CommandParseError::MissingField(name))
        };

        Ok(Self {
            command: field("command")?,
            text: field("text").unwrap_or_default(),
            channel_id: field("channel_id")?,
            user_id: field("user_id")?,
            trigger_id: field("trigger_id").unwrap_or_default(),
            request_id: request_id.into(),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormCommand {
    Start,
    Form,
    Cancel,
}

impl FormCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "/start",
            Self::Form => "/form",
            Self::Cancel => "/cancel",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub command: FormCommand,
    pub text: String,
    pub channel_id: String,
    pub user_id: UserId,
    pub request_id: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
    #[error("slash command payload is missing `{0}`")]
    MissingField(&'static str),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error(transparent)]
    Service(#[from] ApplicationError),
}

pub fn normalize_form_command(
    payload: SlashCommandPayload,
) -> Result<CommandEnvelope, CommandParseError> {
    let command = match payload.command.trim().to_ascii_lowercase().as_str() {
        "/start" => FormCommand::Start,
        "/form" => FormCommand::Form,
        "/cancel" => FormCommand::Cancel,
        _ => return Err(CommandParseError::UnsupportedCommand(payload.command)),
    };

    Ok(CommandEnvelope {
        command,
        text: payload.text.trim().to_owned(),
        channel_id: payload.channel_id,
        user_id: UserId(payload.user_id),
        request_id: payload.request_id,
    })
}

#[async_trait]
pub trait FormCommandService: Send + Sync {
    async fn greet(&self, envelope: &CommandEnvelope) -> Result<MessageTemplate, CommandRouteError>;

    async fn begin_form(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn cancel(&self, envelope: &CommandEnvelope)
        -> Result<MessageTemplate, CommandRouteError>;
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: FormCommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub async fn route(
        &self,
        envelope: CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        match envelope.command {
            FormCommand::Start => self.service.greet(&envelope).await,
            FormCommand::Form => self.service.begin_form(&envelope).await,
            FormCommand::Cancel => self.service.cancel(&envelope).await,
        }
    }
}
