use std::{future::Future, sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::{net::TcpStream, sync::Mutex, task::JoinSet};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::api::SlackWebClient;
use crate::commands::SlashCommandPayload;
use crate::events::{SlackEnvelope, SlackEvent};
use crate::ingress::Ingress;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport closed by peer: {0}")]
    Closed(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// A Socket Mode connection. `next_envelope` yields `Ok(None)` only when the transport is
/// finished for good; a peer-initiated close or a `disconnect` frame is an error so the
/// runner reconnects.
#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

struct PumpFailure {
    error: TransportError,
    connected: bool,
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    ingress: Arc<Ingress>,
    reconnect_policy: ReconnectPolicy,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        ingress: Arc<Ingress>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, ingress, reconnect_policy }
    }

    /// Pumps envelopes until the transport finishes or reconnects are exhausted. Retries
    /// count consecutive failures; a connection that came up resets the count.
    pub async fn start(&self) -> Result<()> {
        self.start_with_shutdown(std::future::pending()).await
    }

    /// Like `start`, but stops reading as soon as `shutdown` resolves. Handlers already
    /// running are allowed to finish.
    pub async fn start_with_shutdown<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let mut tasks = JoinSet::new();
        tokio::select! {
            () = self.pump_with_retries(&mut tasks) => {}
            () = shutdown => {
                info!(event_name = "system.socket.shutdown", "socket mode shutting down");
                if let Err(error) = self.transport.disconnect().await {
                    warn!(error = %error, "socket mode disconnect failed during shutdown");
                }
            }
        }

        // let in-flight handlers finish their replies
        while tasks.join_next().await.is_some() {}
        Ok(())
    }

    async fn pump_with_retries(&self, tasks: &mut JoinSet<()>) {
        let mut attempt = 0;
        loop {
            match self.connect_and_pump(attempt, tasks).await {
                Ok(()) => return,
                Err(PumpFailure { error, connected }) => {
                    if connected {
                        attempt = 0;
                    }
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %error,
                        "socket mode transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted; continuing process without crash"
                        );
                        return;
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn connect_and_pump(
        &self,
        attempt: u32,
        tasks: &mut JoinSet<()>,
    ) -> Result<(), PumpFailure> {
        info!(attempt, "opening socket mode transport connection");
        self.transport
            .connect()
            .await
            .map_err(|error| PumpFailure { error, connected: false })?;
        info!(attempt, "socket mode transport connected");

        loop {
            let next = self
                .transport
                .next_envelope()
                .await
                .map_err(|error| PumpFailure { error, connected: true })?;
            let Some(envelope) = next else {
                info!(attempt, "socket mode transport stream closed");
                return self
                    .transport
                    .disconnect()
                    .await
                    .map_err(|error| PumpFailure { error, connected: true });
            };

            // ack before handling; Slack retries envelopes that are not acked within 3s
            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    "acknowledged slack envelope"
                );
            }

            let ingress = Arc::clone(&self.ingress);
            tasks.spawn(async move { ingress.handle(envelope).await });
            while tasks.try_join_next().is_some() {}
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketFrame {
    Hello,
    Disconnect { reason: String },
    Envelope(SlackEnvelope),
    Ignored,
}

/// Decodes one Socket Mode text frame.
pub fn parse_socket_frame(text: &str) -> Result<SocketFrame, TransportError> {
    let frame: Value = serde_json::from_str(text)
        .map_err(|error| TransportError::Receive(format!("malformed frame: {error}")))?;
    let frame_type = frame.get("type").and_then(Value::as_str).unwrap_or_default();

    match frame_type {
        "hello" => return Ok(SocketFrame::Hello),
        "disconnect" => {
            let reason = frame.get("reason").and_then(Value::as_str).unwrap_or("unspecified");
            return Ok(SocketFrame::Disconnect { reason: reason.to_owned() });
        }
        _ => {}
    }

    let Some(envelope_id) = frame.get("envelope_id").and_then(Value::as_str) else {
        return Ok(SocketFrame::Ignored);
    };
    let payload = frame.get("payload").unwrap_or(&Value::Null);
    let event = match frame_type {
        "events_api" => match payload.get("event") {
            Some(event) => SlackEvent::from_event_callback(event),
            None => SlackEvent::Unsupported { event_type: "events_api.empty".to_owned() },
        },
        "slash_commands" => match SlashCommandPayload::from_json(payload, envelope_id) {
            Ok(command) => SlackEvent::SlashCommand(command),
            Err(error) => {
                warn!(envelope_id, error = %error, "dropping malformed slash command");
                SlackEvent::Unsupported { event_type: "slash_commands.invalid".to_owned() }
            }
        },
        other => SlackEvent::Unsupported { event_type: other.to_owned() },
    };

    Ok(SocketFrame::Envelope(SlackEnvelope { envelope_id: envelope_id.to_owned(), event }))
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket Mode over a real WebSocket, opened through `apps.connections.open`.
pub struct SlackSocketTransport {
    client: SlackWebClient,
    stream: Mutex<Option<WsStream>>,
}

impl SlackSocketTransport {
    pub fn new(client: SlackWebClient) -> Self {
        Self { client, stream: Mutex::new(None) }
    }
}

#[async_trait]
impl SocketTransport for SlackSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = self
            .client
            .open_socket_url()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        *self.stream.lock().await = Some(stream);
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut guard = self.stream.lock().await;
        let stream =
            guard.as_mut().ok_or_else(|| TransportError::Receive("not connected".to_owned()))?;

        loop {
            let message = match stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(error)) => return Err(TransportError::Receive(error.to_string())),
                None => return Err(TransportError::Closed("stream ended".to_owned())),
            };

            match message {
                Message::Text(text) => match parse_socket_frame(&text)? {
                    SocketFrame::Hello => debug!("socket mode hello received"),
                    SocketFrame::Disconnect { reason } => {
                        return Err(TransportError::Closed(format!("disconnect requested: {reason}")))
                    }
                    SocketFrame::Envelope(envelope) => return Ok(Some(envelope)),
                    SocketFrame::Ignored => {}
                },
                Message::Close(frame) => {
                    let reason = frame.map(|frame| frame.reason.to_string()).unwrap_or_default();
                    return Err(TransportError::Closed(reason));
                }
                // pings are answered by tungstenite on the next read
                _ => {}
            }
        }
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let mut guard = self.stream.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| TransportError::Acknowledge("not connected".to_owned()))?;
        stream
            .send(Message::Text(json!({ "envelope_id": envelope_id }).to_string()))
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let Some(mut stream) = self.stream.lock().await.take() else {
            return Ok(());
        };
        stream.close(None).await.map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use super::{
        parse_socket_frame, ReconnectPolicy, SocketFrame, SocketModeRunner, SocketTransport,
        TransportError,
    };
    use crate::events::{form_dispatcher, SlackEnvelope, SlackEvent};
    use crate::form::testing::harness;
    use crate::ingress::testing::RecordingApi;
    use crate::ingress::Ingress;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        envelopes: VecDeque<Result<Option<SlackEnvelope>, TransportError>>,
        disconnect_results: VecDeque<Result<(), TransportError>>,
        connect_attempts: usize,
        acknowledgements: Vec<String>,
        disconnect_calls: usize,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            envelopes: Vec<Result<Option<SlackEnvelope>, TransportError>>,
            disconnect_results: Vec<Result<(), TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    envelopes: envelopes.into(),
                    disconnect_results: disconnect_results.into(),
                    connect_attempts: 0,
                    acknowledgements: Vec::new(),
                    disconnect_calls: 0,
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn acknowledgements(&self) -> Vec<String> {
            self.state.lock().await.acknowledgements.clone()
        }

        async fn disconnect_calls(&self) -> usize {
            self.state.lock().await.disconnect_calls
        }
    }

    #[async_trait]
    impl SocketTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
            let mut state = self.state.lock().await;
            state.envelopes.pop_front().unwrap_or(Ok(None))
        }

        async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.acknowledgements.push(envelope_id.to_owned());
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.disconnect_calls += 1;
            state.disconnect_results.pop_front().unwrap_or(Ok(()))
        }
    }

    fn ingress(api: Arc<RecordingApi>, dir: &std::path::Path) -> Arc<Ingress> {
        let harness = harness(dir, false, false);
        Arc::new(Ingress::new(form_dispatcher(harness.service), api))
    }

    fn unsupported(envelope_id: &str) -> SlackEnvelope {
        SlackEnvelope {
            envelope_id: envelope_id.to_owned(),
            event: SlackEvent::Unsupported { event_type: "test".to_owned() },
        }
    }

    fn no_delay(max_retries: u32) -> ReconnectPolicy {
        ReconnectPolicy { max_retries, base_delay_ms: 0, max_delay_ms: 0 }
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![Ok(Some(unsupported("env-1"))), Ok(None)],
            vec![Ok(())],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            ingress(Arc::new(RecordingApi::default()), dir.path()),
            no_delay(2),
        );

        runner.start().await.expect("runner should not fail");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.acknowledgements().await, vec!["env-1"]);
        assert_eq!(transport.disconnect_calls().await, 1);
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
            vec![],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            ingress(Arc::new(RecordingApi::default()), dir.path()),
            no_delay(2),
        );

        runner.start().await.expect("runner should degrade gracefully");
        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn refresh_disconnects_reconnect_without_spending_retries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let closed = || -> Result<Option<SlackEnvelope>, TransportError> {
            Err(TransportError::Closed("disconnect requested: refresh_requested".to_owned()))
        };
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![],
            vec![
                Ok(Some(unsupported("env-1"))),
                closed(),
                Ok(Some(unsupported("env-2"))),
                closed(),
                closed(),
                Ok(None),
            ],
            vec![],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            ingress(Arc::new(RecordingApi::default()), dir.path()),
            no_delay(1),
        );
        runner.start().await.expect("runner");

        assert_eq!(transport.connect_attempts().await, 4);
        assert_eq!(transport.acknowledgements().await, vec!["env-1", "env-2"]);
    }

    #[tokio::test]
    async fn envelopes_are_handled_and_replied_to() {
        let dir = tempfile::tempdir().expect("tempdir");
        let api = Arc::new(RecordingApi::default());
        let frame = r#"{"envelope_id":"env-7","type":"slash_commands","payload":{"command":"/start","text":"","user_id":"U1","channel_id":"D1","trigger_id":"t"}}"#;
        let SocketFrame::Envelope(envelope) = parse_socket_frame(frame).expect("frame") else {
            panic!("expected an envelope");
        };
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![Ok(Some(envelope)), Ok(None)],
            vec![Ok(())],
        ));

        SocketModeRunner::new(transport.clone(), ingress(api.clone(), dir.path()), no_delay(0))
            .start()
            .await
            .expect("runner");

        assert_eq!(transport.acknowledgements().await, vec!["env-7"]);
        let texts = api.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("Hello <@U1>"));
    }

    #[tokio::test]
    async fn shutdown_stops_a_healthy_connection() {
        struct IdleTransport {
            disconnects: Mutex<usize>,
        }

        #[async_trait]
        impl SocketTransport for IdleTransport {
            async fn connect(&self) -> Result<(), TransportError> {
                Ok(())
            }

            async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
                std::future::pending().await
            }

            async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
                Ok(())
            }

            async fn disconnect(&self) -> Result<(), TransportError> {
                *self.disconnects.lock().await += 1;
                Ok(())
            }
        }

        let dir = tempfile::tempdir().expect("tempdir");
        let transport = Arc::new(IdleTransport { disconnects: Mutex::new(0) });
        let runner = SocketModeRunner::new(
            transport.clone(),
            ingress(Arc::new(RecordingApi::default()), dir.path()),
            no_delay(0),
        );

        runner
            .start_with_shutdown(tokio::time::sleep(std::time::Duration::from_millis(20)))
            .await
            .expect("runner");
        assert_eq!(*transport.disconnects.lock().await, 1);
    }

    #[test]
    fn parses_control_and_event_frames() {
        assert_eq!(parse_socket_frame(r#"{"type":"hello","num_connections":1}"#), Ok(SocketFrame::Hello));
        assert_eq!(
            parse_socket_frame(r#"{"type":"disconnect","reason":"refresh_requested"}"#),
            Ok(SocketFrame::Disconnect { reason: "refresh_requested".to_owned() })
        );

        let frame = r#"{"envelope_id":"e1","type":"events_api","payload":{"type":"event_callback","event":{"type":"message","channel_type":"im","channel":"D1","user":"U1","text":"yes","ts":"1.2"}}}"#;
        let SocketFrame::Envelope(envelope) = parse_socket_frame(frame).expect("frame") else {
            panic!("expected an envelope");
        };
        assert_eq!(envelope.envelope_id, "e1");
        assert_eq!(envelope.event.reply_channel(), Some("D1"));

        let interactive = r#"{"envelope_id":"e2","type":"interactive","payload":{}}"#;
        assert_eq!(
            parse_socket_frame(interactive),
            Ok(SocketFrame::Envelope(SlackEnvelope {
                envelope_id: "e2".to_owned(),
                event: SlackEvent::Unsupported { event_type: "interactive".to_owned() },
            }))
        );

        assert!(parse_socket_frame("not json").is_err());
    }
}
