//! HTTP delivery of Slack events and slash commands, used when no app token is set.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use paybot_slack::commands::SlashCommandPayload;
use paybot_slack::signature::{self, SignatureError};
use paybot_slack::{Ingress, SlackEnvelope, SlackEvent};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::{debug, warn};

const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
const SIGNATURE_HEADER: &str = "x-slack-signature";

#[derive(Clone)]
pub struct SlackHttpState {
    pub ingress: Arc<Ingress>,
    pub signing_secret: SecretString,
}

pub fn router(state: SlackHttpState) -> Router {
    Router::new()
        .route("/slack/events", post(events))
        .route("/slack/commands", post(commands))
        .with_state(state)
}

impl SlackHttpState {
    fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), SignatureError> {
        let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
        signature::verify(
            self.signing_secret.expose_secret(),
            header(TIMESTAMP_HEADER),
            body,
            header(SIGNATURE_HEADER),
            Utc::now().timestamp(),
        )
    }
}

fn rejected(error: SignatureError) -> Response {
    warn!(
        event_name = "ingress.http.signature_rejected",
        error = %error,
        "rejected unsigned or stale slack request"
    );
    (StatusCode::UNAUTHORIZED, error.to_string()).into_response()
}

fn bad_request(reason: String) -> Response {
    warn!(event_name = "ingress.http.bad_request", reason = %reason, "malformed slack request");
    (StatusCode::BAD_REQUEST, reason).into_response()
}

async fn events(State(state): State<SlackHttpState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(error) = state.verify(&headers, &body) {
        return rejected(error);
    }
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(error) => return bad_request(format!("event body is not json: {error}")),
    };

    match payload.get("type").and_then(Value::as_str) {
        Some("url_verification") => {
            let challenge = payload.get("challenge").cloned().unwrap_or(Value::Null);
            Json(json!({ "challenge": challenge })).into_response()
        }
        Some("event_callback") => {
            let envelope_id = payload
                .get("event_id")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| format!("evt-{}", Utc::now().timestamp_millis()));
            let event = payload
                .get("event")
                .map(SlackEvent::from_event_callback)
                .unwrap_or(SlackEvent::Unsupported { event_type: "missing".to_owned() });
            state.ingress.spawn(SlackEnvelope { envelope_id, event });
            StatusCode::OK.into_response()
        }
        other => {
            debug!(
                event_name = "ingress.http.ignored",
                payload_type = other.unwrap_or("unknown"),
                "ignored slack payload"
            );
            StatusCode::OK.into_response()
        }
    }
}

async fn commands(
    State(state): State<SlackHttpState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(error) = state.verify(&headers, &body) {
        return rejected(error);
    }
    let fields: HashMap<String, String> = match serde_urlencoded::from_bytes(&body) {
        Ok(fields) => fields,
        Err(error) => return bad_request(format!("command body is not form encoded: {error}")),
    };

    let request_id = fields
        .get("trigger_id")
        .filter(|trigger| !trigger.is_empty())
        .cloned()
        .unwrap_or_else(|| format!("cmd-{}", Utc::now().timestamp_millis()));
    let value = Value::Object(fields.into_iter().map(|(key, value)| (key, Value::String(value))).collect());
    let payload = match SlashCommandPayload::from_json(&value, request_id.clone()) {
        Ok(payload) => payload,
        Err(error) => return bad_request(error.to_string()),
    };

    // the reply goes out through chat.postMessage; the ack body stays empty
    state.ingress.spawn(SlackEnvelope {
        envelope_id: request_id,
        event: SlackEvent::SlashCommand(payload),
    });
    StatusCode::OK.into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use chrono::Utc;
    use paybot_core::config::AppConfig;
    use paybot_core::export::{ChannelPublisher, FileUpload, MailTransport, OutboundMail, SinkError};
    use paybot_slack::api::{SlackApi, SlackApiError};
    use paybot_slack::blocks::{HomeView, MessageTemplate};
    use paybot_slack::signature::compute_signature;
    use paybot_slack::Ingress;
    use serde_json::json;
    use tower::ServiceExt;

    use super::{router, SlackHttpState};
    use crate::bootstrap::wire;

    const SECRET: &str = "test-signing-secret";

    #[derive(Default)]
    struct RecordingSlack {
        posts: Mutex<Vec<(String, String)>>,
    }

    impl RecordingSlack {
        fn posts(&self) -> Vec<(String, String)> {
            self.posts.lock().map(|posts| posts.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl SlackApi for RecordingSlack {
        async fn post_message(
            &self,
            channel_id: &str,
            message: &MessageTemplate,
        ) -> Result<(), SlackApiError> {
            if let Ok(mut posts) = self.posts.lock() {
                posts.push((channel_id.to_owned(), message.fallback_text.clone()));
            }
            Ok(())
        }

        async fn publish_home(&self, _user_id: &str, _view: &HomeView) -> Result<(), SlackApiError> {
            Ok(())
        }
    }

    #[async_trait]
    impl ChannelPublisher for RecordingSlack {
        async fn post_text(&self, _channel_id: &str, _text: &str) -> Result<(), SinkError> {
            Ok(())
        }

        async fn upload_file(&self, _channel_id: &str, _file: FileUpload) -> Result<(), SinkError> {
            Ok(())
        }
    }

    struct NullMailer;

    #[async_trait]
    impl MailTransport for NullMailer {
        async fn send(&self, _mail: OutboundMail) -> Result<(), SinkError> {
            Ok(())
        }
    }

    fn app(dir: &tempfile::TempDir) -> (Router, Arc<RecordingSlack>, Arc<Ingress>) {
        let mut config = AppConfig::default();
        config.storage.csv_path = dir.path().join("payment_data.csv");
        let slack = Arc::new(RecordingSlack::default());
        let (_, ingress) =
            wire(&config, slack.clone(), slack.clone(), Arc::new(NullMailer)).expect("wire");
        let state =
            SlackHttpState { ingress: ingress.clone(), signing_secret: SECRET.to_owned().into() };
        (router(state), slack, ingress)
    }

    fn signed(uri: &str, content_type: &str, body: &str, timestamp: i64) -> Request<Body> {
        let timestamp = timestamp.to_string();
        Request::post(uri)
            .header("content-type", content_type)
            .header("x-slack-request-timestamp", &timestamp)
            .header("x-slack-signature", compute_signature(SECRET, &timestamp, body.as_bytes()))
            .body(Body::from(body.to_owned()))
            .expect("request")
    }

    #[tokio::test]
    async fn url_verification_echoes_the_challenge() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (router, _, _) = app(&dir);
        let body = r#"{"type":"url_verification","challenge":"abc123"}"#;

        let response = router
            .oneshot(signed("/slack/events", "application/json", body, Utc::now().timestamp()))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(payload["challenge"], "abc123");
    }

    #[tokio::test]
    async fn unsigned_and_stale_requests_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (router, slack, _) = app(&dir);
        let body = r#"{"type":"url_verification","challenge":"abc123"}"#;

        let unsigned = Request::post("/slack/events")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .expect("request");
        let response = router.clone().oneshot(unsigned).await.expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let stale = signed("/slack/events", "application/json", body, Utc::now().timestamp() - 600);
        let response = router.oneshot(stale).await.expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(slack.posts().is_empty());
    }

    #[tokio::test]
    async fn slash_command_is_acked_empty_and_answered_in_channel() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (router, slack, ingress) = app(&dir);
        let body = "command=%2Fstart&text=&channel_id=D1&user_id=U1&trigger_id=T-1";

        let response = router
            .oneshot(signed(
                "/slack/commands",
                "application/x-www-form-urlencoded",
                body,
                Utc::now().timestamp(),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        assert!(bytes.is_empty());

        ingress.drain().await;
        let posts = slack.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, "D1");
        assert!(posts[0].1.starts_with("Hello <@U1>"));
    }

    #[tokio::test]
    async fn command_without_user_is_a_bad_request() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (router, _, _) = app(&dir);

        let response = router
            .oneshot(signed(
                "/slack/commands",
                "application/x-www-form-urlencoded",
                "command=%2Fform&channel_id=D1",
                Utc::now().timestamp(),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn direct_message_event_reaches_the_form() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (router, slack, ingress) = app(&dir);
        let body = r#"{
            "type": "event_callback",
            "event_id": "Ev1",
            "event": {"type": "message", "channel_type": "im", "channel": "D9", "user": "U1", "text": "hello", "ts": "1.0"}
        }"#;

        let response = router
            .oneshot(signed("/slack/events", "application/json", body, Utc::now().timestamp()))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        ingress.drain().await;
        let posts = slack.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, "D9");
    }

    #[tokio::test]
    async fn submission_finishes_before_drain_returns() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (router, slack, ingress) = app(&dir);
        let message = |index: usize, text: &str| {
            json!({
                "type": "event_callback",
                "event_id": format!("Ev{index}"),
                "event": {"type": "message", "channel_type": "im", "channel": "D9", "user": "U1", "text": text, "ts": "1.0"}
            })
            .to_string()
        };

        let response = router
            .clone()
            .oneshot(signed(
                "/slack/commands",
                "application/x-www-form-urlencoded",
                "command=%2Fform&text=&channel_id=D9&user_id=U1&trigger_id=T-1",
                Utc::now().timestamp(),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        ingress.drain().await;

        let answers = ["Jane Doe", "Travel", "50000", "0123456789", "Jane Doe", "First Bank", "yes"];
        for (index, answer) in answers.into_iter().enumerate() {
            let body = message(index, answer);
            let response = router
                .clone()
                .oneshot(signed("/slack/events", "application/json", &body, Utc::now().timestamp()))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::OK);
            ingress.drain().await;
        }

        let log = std::fs::read_to_string(dir.path().join("payment_data.csv")).expect("record log");
        assert_eq!(log.lines().count(), 2);
        assert!(slack
            .posts()
            .last()
            .is_some_and(|(channel, text)| channel == "D9" && text.starts_with("Your application")));
    }
}
