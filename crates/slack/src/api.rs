//! Slack Web API calls made by the bot: replies, Home tab views, file uploads and the
//! Socket Mode handshake.

use std::time::Duration;

use async_trait::async_trait;
use paybot_core::config::SlackConfig;
use paybot_core::export::{ChannelPublisher, FileUpload, SinkError};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::blocks::{HomeView, MessageTemplate};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SlackApiError {
    #[error("slack request to {method} failed: {message}")]
    Http { method: &'static str, message: String },
    #[error("slack method {method} returned `{error}`")]
    Api { method: &'static str, error: String },
    #[error("slack response from {method} could not be decoded: {message}")]
    Decode { method: &'static str, message: String },
    #[error("socket mode requires `slack.app_token`")]
    MissingAppToken,
}

impl From<SlackApiError> for SinkError {
    fn from(value: SlackApiError) -> Self {
        match value {
            SlackApiError::Api { .. } => Self::Rejected(value.to_string()),
            SlackApiError::MissingAppToken => Self::NotConfigured("slack.app_token".to_owned()),
            SlackApiError::Http { .. } | SlackApiError::Decode { .. } => {
                Self::Transport(value.to_string())
            }
        }
    }
}

/// Outbound calls the ingress layer needs.
#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn post_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError>;

    async fn publish_home(&self, user_id: &str, view: &HomeView) -> Result<(), SlackApiError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AuthIdentity {
    pub team: String,
    pub user: String,
    #[serde(default)]
    pub bot_id: Option<String>,
}

#[derive(Deserialize)]
struct UploadTicket {
    upload_url: String,
    file_id: String,
}

#[derive(Clone)]
pub struct SlackWebClient {
    client: Client,
    base_url: String,
    bot_token: SecretString,
    app_token: Option<SecretString>,
}

impl SlackWebClient {
    pub fn from_config(config: &SlackConfig) -> Result<Self, SlackApiError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build().map_err(|error| {
            SlackApiError::Http { method: "client.build", message: error.to_string() }
        })?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            bot_token: config.bot_token.clone(),
            app_token: config.app_token.clone(),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn call_json(
        &self,
        method: &'static str,
        token: &SecretString,
        body: &Value,
    ) -> Result<Value, SlackApiError> {
        let response = self
            .client
            .post(self.url(method))
            .bearer_auth(token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|error| SlackApiError::Http { method, message: error.to_string() })?;
        read_envelope(method, response).await
    }

    async fn call_form(
        &self,
        method: &'static str,
        form: &[(&str, String)],
    ) -> Result<Value, SlackApiError> {
        let response = self
            .client
            .post(self.url(method))
            .bearer_auth(self.bot_token.expose_secret())
            .form(form)
            .send()
            .await
            .map_err(|error| SlackApiError::Http { method, message: error.to_string() })?;
        read_envelope(method, response).await
    }

    /// Confirms the bot token and reports who it belongs to.
    pub async fn auth_test(&self) -> Result<AuthIdentity, SlackApiError> {
        let method = "auth.test";
        let payload = self.call_json(method, &self.bot_token, &json!({})).await?;
        serde_json::from_value(payload)
            .map_err(|error| SlackApiError::Decode { method, message: error.to_string() })
    }

    /// Asks for a fresh Socket Mode WebSocket URL. Each URL is good for one connection.
    pub async fn open_socket_url(&self) -> Result<String, SlackApiError> {
        let method = "apps.connections.open";
        let token = self.app_token.as_ref().ok_or(SlackApiError::MissingAppToken)?;
        let payload = self.call_json(method, token, &json!({})).await?;
        payload
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| SlackApiError::Decode { method, message: "missing `url`".to_owned() })
    }

    async fn upload(&self, channel_id: &str, file: FileUpload) -> Result<(), SlackApiError> {
        let method = "files.getUploadURLExternal";
        let ticket = self
            .call_form(
                method,
                &[("filename", file.file_name.clone()), ("length", file.bytes.len().to_string())],
            )
            .await?;
        let ticket: UploadTicket = serde_json::from_value(ticket)
            .map_err(|error| SlackApiError::Decode { method, message: error.to_string() })?;

        let method = "files.upload";
        let response = self
            .client
            .post(&ticket.upload_url)
            .body(file.bytes)
            .send()
            .await
            .map_err(|error| SlackApiError::Http { method, message: error.to_string() })?;
        if !response.status().is_success() {
            return Err(SlackApiError::Http {
                method,
                message: format!("upload endpoint returned {}", response.status()),
            });
        }
        debug!(event_name = "slack.file_bytes_uploaded", file_id = %ticket.file_id, "file bytes uploaded");

        self.call_json(
            "files.completeUploadExternal",
            &self.bot_token,
            &json!({
                "files": [{"id": ticket.file_id, "title": file.title}],
                "channel_id": channel_id,
            }),
        )
        .await?;
        info!(event_name = "slack.file_shared", channel_id, file_name = %file.file_name, "file shared");
        Ok(())
    }
}

async fn read_envelope(
    method: &'static str,
    response: reqwest::Response,
) -> Result<Value, SlackApiError> {
    if !response.status().is_success() {
        return Err(SlackApiError::Http {
            method,
            message: format!("slack returned {}", response.status()),
        });
    }
    let payload: Value = response
        .json()
        .await
        .map_err(|error| SlackApiError::Decode { method, message: error.to_string() })?;

    if payload.get("ok").and_then(Value::as_bool) == Some(true) {
        Ok(payload)
    } else {
        let error = payload.get("error").and_then(Value::as_str).unwrap_or("unknown_error");
        Err(SlackApiError::Api { method, error: error.to_owned() })
    }
}

#[async_trait]
impl SlackApi for SlackWebClient {
    async fn post_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        self.call_json(
            "chat.postMessage",
            &self.bot_token,
            &json!({
                "channel": channel_id,
                "text": message.fallback_text,
                "blocks": message.blocks,
            }),
        )
        .await?;
        Ok(())
    }

    async fn publish_home(&self, user_id: &str, view: &HomeView) -> Result<(), SlackApiError> {
        self.call_json("views.publish", &self.bot_token, &json!({"user_id": user_id, "view": view}))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ChannelPublisher for SlackWebClient {
    async fn post_text(&self, channel_id: &str, text: &str) -> Result<(), SinkError> {
        self.call_json(
            "chat.postMessage",
            &self.bot_token,
            &json!({"channel": channel_id, "text": text, "mrkdwn": true}),
        )
        .await?;
        Ok(())
    }

    async fn upload_file(&self, channel_id: &str, file: FileUpload) -> Result<(), SinkError> {
        self.upload(channel_id, file).await.map_err(SinkError::from)
    }
}

#[cfg(test)]
mod tests {
    use paybot_core::config::SlackConfig;
    use paybot_core::export::{ChannelPublisher, FileUpload, SinkError};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{SlackApi, SlackApiError, SlackWebClient};
    use crate::blocks::text_message;

    fn client(server: &MockServer, app_token: Option<&str>) -> SlackWebClient {
        SlackWebClient::from_config(&SlackConfig {
            bot_token: "xoxb-test".to_owned().into(),
            app_token: app_token.map(|token| token.to_owned().into()),
            signing_secret: None,
            channel_id: None,
            api_base_url: format!("{}/api", server.uri()),
        })
        .expect("client")
    }

    #[tokio::test]
    async fn post_message_sends_blocks_with_bot_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat.postMessage"))
            .and(header("authorization", "Bearer xoxb-test"))
            .and(body_partial_json(json!({"channel": "D1", "text": "Please enter your name:"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server, None)
            .post_message("D1", &text_message("form.ask.name.v1", "Please enter your name:"))
            .await
            .expect("posted");
    }

    #[tokio::test]
    async fn api_errors_surface_the_slack_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat.postMessage"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": false, "error": "channel_not_found"})),
            )
            .mount(&server)
            .await;

        let error = client(&server, None).post_text("C404", "hello").await.expect_err("rejected");
        assert_eq!(
            error,
            SinkError::Rejected("slack method chat.postMessage returned `channel_not_found`".to_owned())
        );
    }

    #[tokio::test]
    async fn upload_runs_the_three_step_external_flow() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/files.getUploadURLExternal"))
            .and(body_string_contains("filename=Payment+Data.xlsx"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "upload_url": format!("{}/upload/F1", server.uri()),
                "file_id": "F1"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/upload/F1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/files.completeUploadExternal"))
            .and(body_partial_json(json!({
                "channel_id": "C1",
                "files": [{"id": "F1", "title": "Payment Data - 2026-03-01 09:30"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server, None)
            .upload_file(
                "C1",
                FileUpload {
                    file_name: "Payment Data.xlsx".to_owned(),
                    title: "Payment Data - 2026-03-01 09:30".to_owned(),
                    bytes: b"PK\x03\x04".to_vec(),
                },
            )
            .await
            .expect("uploaded");
    }

    #[tokio::test]
    async fn socket_url_needs_app_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/apps.connections.open"))
            .and(header("authorization", "Bearer xapp-test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": true, "url": "wss://wss.slack.test/link"})),
            )
            .mount(&server)
            .await;

        assert_eq!(
            client(&server, None).open_socket_url().await,
            Err(SlackApiError::MissingAppToken)
        );
        assert_eq!(
            client(&server, Some("xapp-test")).open_socket_url().await.expect("url"),
            "wss://wss.slack.test/link"
        );
    }
}
