use serde::{Deserialize, Serialize};

use crate::domain::submission::FormField;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowType {
    PaymentApplication,
}

/// Position of a user in the questionnaire. `Idle` is both the initial and the
/// terminal state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversationState {
    #[default]
    Idle,
    Choice,
    Name,
    Reason,
    Amount,
    AccountNumber,
    AccountName,
    BankName,
    Confirm,
}

impl ConversationState {
    pub fn for_field(field: FormField) -> Self {
        match field {
            FormField::Name => Self::Name,
            FormField::Reason => Self::Reason,
            FormField::Amount => Self::Amount,
            FormField::AccountNumber => Self::AccountNumber,
            FormField::AccountName => Self::AccountName,
            FormField::BankName => Self::BankName,
        }
    }

    /// The field collected while in this state, if it is an answer state.
    pub fn field(self) -> Option<FormField> {
        match self {
            Self::Name => Some(FormField::Name),
            Self::Reason => Some(FormField::Reason),
            Self::Amount => Some(FormField::Amount),
            Self::AccountNumber => Some(FormField::AccountNumber),
            Self::AccountName => Some(FormField::AccountName),
            Self::BankName => Some(FormField::BankName),
            Self::Idle | Self::Choice | Self::Confirm => None,
        }
    }

    pub fn is_idle(self) -> bool {
        self == Self::Idle
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Choice => "choice",
            Self::Name => "name",
            Self::Reason => "reason",
            Self::Amount => "amount",
            Self::AccountNumber => "account_number",
            Self::AccountName => "account_name",
            Self::BankName => "bank_name",
            Self::Confirm => "confirm",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEvent {
    Greet,
    BeginForm,
    Cancel,
    Message { text: String },
}

impl FlowEvent {
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FlowContext {
    pub missing_required_fields: Vec<FormField>,
    pub has_previous_submission: bool,
    pub offer_update: bool,
    pub prefilled: bool,
}

/// Outbound prompt kinds. Rendering into chat text lives with the chat adapter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Prompt {
    Greeting,
    IdleHint,
    Ask(FormField),
    ChooseMode,
    InvalidChoice,
    ReviewDetails,
    InvalidConfirmation,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    ResetDraft,
    PrefillFromPrevious,
    StoreField { field: FormField, value: String },
    ExportSubmission,
    DiscardDraft,
    Reply(Prompt),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: ConversationState,
    pub to: ConversationState,
    pub event: FlowEvent,
    pub actions: Vec<FlowAction>,
}

impl TransitionOutcome {
    pub fn exports(&self) -> bool {
        self.actions.contains(&FlowAction::ExportSubmission)
    }

    pub fn prompts(&self) -> impl Iterator<Item = &Prompt> {
        self.actions.iter().filter_map(|action| match action {
            FlowAction::Reply(prompt) => Some(prompt),
            _ => None,
        })
    }
}
