use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::api::SlackApi;
use crate::blocks::{self, MessageTemplate};
use crate::events::{DispatchError, EventContext, EventDispatcher, HandlerResult, SlackEnvelope};

/// Shared path from a received envelope to the dispatcher and back out to Slack. Both
/// Socket Mode and the HTTP endpoints hand envelopes here after acknowledging them.
pub struct Ingress {
    dispatcher: EventDispatcher,
    api: Arc<dyn SlackApi>,
    in_flight: Mutex<JoinSet<()>>,
}

impl Ingress {
    pub fn new(dispatcher: EventDispatcher, api: Arc<dyn SlackApi>) -> Self {
        Self { dispatcher, api, in_flight: Mutex::new(JoinSet::new()) }
    }

    /// Handles the envelope on its own task so the caller can return its ack. The task is
    /// tracked until it finishes; see [`Ingress::drain`].
    pub fn spawn(self: &Arc<Self>, envelope: SlackEnvelope) {
        let ingress = Arc::clone(self);
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        while in_flight.try_join_next().is_some() {}
        in_flight.spawn(async move { ingress.handle(envelope).await });
    }

    /// Waits for every spawned envelope, including ones spawned while draining.
    pub async fn drain(&self) {
        loop {
            let mut pending = std::mem::take(
                &mut *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner),
            );
            if pending.is_empty() {
                return;
            }
            info!(
                event_name = "ingress.slack.draining",
                correlation_id = "shutdown",
                in_flight = pending.len(),
                "waiting for in-flight envelopes"
            );
            while pending.join_next().await.is_some() {}
        }
    }

    pub async fn handle(&self, envelope: SlackEnvelope) {
        let context = EventContext { correlation_id: envelope.envelope_id.clone() };
        info!(
            event_name = "ingress.slack.envelope_received",
            envelope_id = %envelope.envelope_id,
            event_type = ?envelope.event.event_type(),
            correlation_id = %context.correlation_id,
            user_id = envelope.event.user_id().unwrap_or("unknown"),
            "received slack envelope"
        );

        match self.dispatcher.dispatch(&envelope, &context).await {
            Ok(HandlerResult::Responded(message)) => self.reply(&envelope, &context, &message).await,
            Ok(HandlerResult::PublishHome { user_id, view }) => {
                if let Err(error) = self.api.publish_home(&user_id, &view).await {
                    warn!(
                        event_name = "ingress.slack.home_publish_failed",
                        correlation_id = %context.correlation_id,
                        user_id = %user_id,
                        error = %error,
                        "failed to publish home view"
                    );
                }
            }
            Ok(HandlerResult::Processed | HandlerResult::Ignored) => {
                debug!(
                    event_name = "ingress.slack.no_reply",
                    correlation_id = %context.correlation_id,
                    "envelope produced no reply"
                );
            }
            Err(DispatchError::Handler(error)) => {
                warn!(
                    event_name = "ingress.slack.dispatch_failed",
                    correlation_id = %context.correlation_id,
                    error = %error,
                    "event dispatch failed"
                );
                let interface = error.into_application().into_interface(&context.correlation_id);
                let message =
                    blocks::error_message(interface.user_message(), interface.correlation_id());
                self.reply(&envelope, &context, &message).await;
            }
        }
    }

    async fn reply(&self, envelope: &SlackEnvelope, context: &EventContext, message: &MessageTemplate) {
        let Some(channel_id) = envelope.event.reply_channel() else {
            debug!(
                event_name = "ingress.slack.no_reply_channel",
                correlation_id = %context.correlation_id,
                "reply dropped; event has no channel"
            );
            return;
        };

        if let Err(error) = self.api.post_message(channel_id, message).await {
            warn!(
                event_name = "ingress.slack.reply_failed",
                correlation_id = %context.correlation_id,
                channel_id,
                error = %error,
                "failed to post reply"
            );
        }
    }
}
