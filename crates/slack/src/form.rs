//! Conversation service: applies flow transitions to a user's session and carries out
//! the resulting actions.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use paybot_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use paybot_core::export::{ExportReport, ExportVerdict};
use paybot_core::flows::{FlowAction, FlowEvent};
use paybot_core::{
    ApplicationError, DomainError, ExportPipeline, FlowEngine, PaymentFormFlow, SessionStore,
    SubmissionDraft, UserId,
};
use tracing::{info, warn};

use crate::blocks::{export_result_message, prompt_message, MessageTemplate};
use crate::commands::{CommandEnvelope, CommandRouteError, FormCommandService};
use crate::events::{EventContext, MessageEvent, MessageService};

#[derive(Clone)]
pub struct FormService {
    engine: Arc<FlowEngine<PaymentFormFlow>>,
    sessions: Arc<SessionStore>,
    pipeline: Arc<ExportPipeline>,
    audit: Arc<dyn AuditSink>,
    offer_update: bool,
}

impl FormService {
    pub fn new(
        sessions: Arc<SessionStore>,
        pipeline: Arc<ExportPipeline>,
        audit: Arc<dyn AuditSink>,
        offer_update: bool,
    ) -> Self {
        Self {
            engine: Arc::new(FlowEngine::default()),
            sessions,
            pipeline,
            audit,
            offer_update,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Runs one event for one user. The user's session stays locked until every action,
    /// including an export, has finished, so a second event from the same user waits.
    pub async fn apply(
        &self,
        user_id: &UserId,
        channel_id: &str,
        event: FlowEvent,
        correlation_id: &str,
    ) -> Result<Option<MessageTemplate>, ApplicationError> {
        let mut session = self.sessions.lock(user_id).await;
        let previous = self.sessions.last_submission(user_id);
        let context = session.flow_context(previous.is_some(), self.offer_update);
        let audit_context = AuditContext::new(
            Some(user_id.clone()),
            Some(channel_id.to_owned()),
            correlation_id,
            "slack",
        );

        let outcome = self
            .engine
            .apply_with_audit(&session.state, &event, &context, self.audit.as_ref(), &audit_context)
            .map_err(DomainError::from)?;

        let mut reply = None;
        for action in &outcome.actions {
            match action {
                FlowAction::ResetDraft | FlowAction::DiscardDraft => {
                    session.draft = SubmissionDraft::default();
                }
                FlowAction::PrefillFromPrevious => {
                    if let Some(previous) = &previous {
                        session.draft.prefill_from(previous);
                    }
                }
                FlowAction::StoreField { field, value } => session.draft.set(*field, value.clone()),
                FlowAction::ExportSubmission => {
                    let submission = session.draft.complete(user_id.clone(), Utc::now())?;
                    let report = self.pipeline.export(&submission).await;
                    self.record_export(&audit_context, &report);
                    if report.saved() {
                        self.sessions.remember_submission(submission);
                    }
                    reply = Some(export_result_message(&report.verdict()));
                }
                FlowAction::Reply(prompt) => {
                    reply = Some(prompt_message(prompt, user_id, &session.draft));
                }
            }
        }

        info!(
            event_name = "form.transition",
            correlation_id,
            user_id = %user_id,
            from = outcome.from.as_str(),
            to = outcome.to.as_str(),
            "conversation advanced"
        );
        session.state = outcome.to;
        Ok(reply)
    }

    fn record_export(&self, audit_context: &AuditContext, report: &ExportReport) {
        let verdict = report.verdict();
        let outcome = match verdict {
            ExportVerdict::Submitted => AuditOutcome::Success,
            ExportVerdict::SavedWithWarnings { .. } | ExportVerdict::SaveFailed => {
                AuditOutcome::Failed
            }
        };
        if !matches!(verdict, ExportVerdict::Submitted) {
            warn!(
                event_name = "export.degraded",
                correlation_id = %audit_context.correlation_id,
                saved = report.saved(),
                "submission export did not reach every destination"
            );
        }

        let mut event =
            AuditEvent::new(audit_context, "export.completed", AuditCategory::Export, outcome)
                .with_metadata("escalated", report.escalation.escalated.to_string());
        for sink in &report.sinks {
            event = event.with_metadata(sink.sink.as_str(), sink.outcome.to_string());
        }
        self.audit.emit(event);
    }

    async fn command_reply(
        &self,
        envelope: &CommandEnvelope,
        event: FlowEvent,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let reply = self
            .apply(&envelope.user_id, &envelope.channel_id, event, &envelope.request_id)
            .await?;
        reply.ok_or_else(|| {
            CommandRouteError::Service(
                DomainError::InvariantViolation(format!(
                    "{} produced no reply",
                    envelope.command.as_str()
                ))
                .into(),
            )
        })
    }
}

#[async_trait]
impl FormCommandService for FormService {
    async fn greet(&self, envelope: &CommandEnvelope) -> Result<MessageTemplate, CommandRouteError> {
        self.command_reply(envelope, FlowEvent::Greet).await
    }

    async fn begin_form(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        self.command_reply(envelope, FlowEvent::BeginForm).await
    }

    async fn cancel(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        self.command_reply(envelope, FlowEvent::Cancel).await
    }
}

#[async_trait]
impl MessageService for FormService {
    async fn handle_message(
        &self,
        user_id: &UserId,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, ApplicationError> {
        self.apply(user_id, &event.channel_id, FlowEvent::message(event.text.clone()), &ctx.correlation_id)
            .await
    }
}
