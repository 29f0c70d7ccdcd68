use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::submission::FormField;
use crate::flows::states::{
    ConversationState, FlowAction, FlowContext, FlowEvent, FlowType, Prompt, TransitionOutcome,
};

pub trait FlowDefinition {
    fn flow_type(&self) -> FlowType;
    fn initial_state(&self) -> ConversationState;
    fn transition(
        &self,
        current: &ConversationState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

#[derive(Clone, Debug, Default)]
pub struct PaymentFormFlow;

impl FlowDefinition for PaymentFormFlow {
    fn flow_type(&self) -> FlowType {
        FlowType::PaymentApplication
    }

    fn initial_state(&self) -> ConversationState {
        ConversationState::Idle
    }

    fn transition(
        &self,
        current: &ConversationState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_payment_form(current, event, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn flow_type(&self) -> FlowType {
        self.flow.flow_type()
    }

    pub fn initial_state(&self) -> ConversationState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &ConversationState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, context)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &ConversationState,
        event: &FlowEvent,
        context: &FlowContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event, context);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "flow.transition_applied",
                        AuditCategory::Flow,
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", outcome.from.as_str())
                    .with_metadata("to", outcome.to.as_str())
                    .with_metadata("event", event_label(&outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "flow.transition_rejected",
                        AuditCategory::Flow,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

impl Default for FlowEngine<PaymentFormFlow> {
    fn default() -> Self {
        Self::new(PaymentFormFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("missing required fields before transition from {state:?}: {missing_fields:?}")]
    MissingRequiredFields { state: ConversationState, missing_fields: Vec<FormField> },
}

// Answer text is never logged: it carries account details.
fn event_label(event: &FlowEvent) -> &'static str {
    match event {
        FlowEvent::Greet => "greet",
        FlowEvent::BeginForm => "begin_form",
        FlowEvent::Cancel => "cancel",
        FlowEvent::Message { .. } => "message",
    }
}

fn next_after(field: FormField, prefilled: bool) -> ConversationState {
    match field {
        FormField::Name => ConversationState::Reason,
        FormField::Reason => ConversationState::Amount,
        FormField::Amount if prefilled => ConversationState::Confirm,
        FormField::Amount => ConversationState::AccountNumber,
        FormField::AccountNumber => ConversationState::AccountName,
        FormField::AccountName => ConversationState::BankName,
        FormField::BankName => ConversationState::Confirm,
    }
}

fn prompt_for(state: ConversationState) -> Prompt {
    match state.field() {
        Some(field) => Prompt::Ask(field),
        None => match state {
            ConversationState::Choice => Prompt::ChooseMode,
            ConversationState::Confirm => Prompt::ReviewDetails,
            _ => Prompt::IdleHint,
        },
    }
}

fn transition_payment_form(
    current: &ConversationState,
    event: &FlowEvent,
    context: &FlowContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use ConversationState::{Choice, Confirm, Idle, Name, Reason};
    use FlowAction::{
        DiscardDraft, ExportSubmission, PrefillFromPrevious, Reply, ResetDraft, StoreField,
    };

    let state = *current;
    let (to, actions) = match (state, event) {
        (_, FlowEvent::Greet) => (state, vec![Reply(Prompt::Greeting)]),
        (_, FlowEvent::Cancel) => (Idle, vec![DiscardDraft, Reply(Prompt::Cancelled)]),
        (_, FlowEvent::BeginForm) => {
            if context.offer_update && context.has_previous_submission {
                (Choice, vec![ResetDraft, Reply(Prompt::ChooseMode)])
            } else {
                (Name, vec![ResetDraft, Reply(Prompt::Ask(FormField::Name))])
            }
        }
        (Idle, FlowEvent::Message { .. }) => (Idle, vec![Reply(Prompt::IdleHint)]),
        (Choice, FlowEvent::Message { text }) => {
            match text.trim().to_ascii_lowercase().as_str() {
                "update" if context.has_previous_submission => {
                    (Reason, vec![PrefillFromPrevious, Reply(Prompt::Ask(FormField::Reason))])
                }
                "full" | "update" => (Name, vec![ResetDraft, Reply(Prompt::Ask(FormField::Name))]),
                _ => (Choice, vec![Reply(Prompt::InvalidChoice)]),
            }
        }
        (Confirm, FlowEvent::Message { text }) => {
            match text.trim().to_ascii_lowercase().as_str() {
                "yes" => {
                    if !context.missing_required_fields.is_empty() {
                        return Err(FlowTransitionError::MissingRequiredFields {
                            state,
                            missing_fields: context.missing_required_fields.clone(),
                        });
                    }
                    (Idle, vec![ExportSubmission, DiscardDraft])
                }
                "no" => (Idle, vec![DiscardDraft, Reply(Prompt::Cancelled)]),
                _ => (Confirm, vec![Reply(Prompt::InvalidConfirmation)]),
            }
        }
        (answering, FlowEvent::Message { text }) => {
            let Some(field) = answering.field() else {
                return Ok(TransitionOutcome {
                    from: state,
                    to: Idle,
                    event: event.clone(),
                    actions: vec![Reply(Prompt::IdleHint)],
                });
            };

            let value = text.trim();
            if value.is_empty() {
                (answering, vec![Reply(Prompt::Ask(field))])
            } else {
                let next = next_after(field, context.prefilled);
                (
                    next,
                    vec![StoreField { field, value: value.to_owned() }, Reply(prompt_for(next))],
                )
            }
        }
    };

    Ok(TransitionOutcome { from: state, to, event: event.clone(), actions })
}
