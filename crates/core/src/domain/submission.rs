use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Answer fields in the order the questionnaire asks for them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormField {
    Name,
    Reason,
    Amount,
    AccountNumber,
    AccountName,
    BankName,
}

impl FormField {
    pub const ORDERED: [FormField; 6] = [
        FormField::Name,
        FormField::Reason,
        FormField::Amount,
        FormField::AccountNumber,
        FormField::AccountName,
        FormField::BankName,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Reason => "Reason",
            Self::Amount => "Amount",
            Self::AccountNumber => "Account Number",
            Self::AccountName => "Account Name",
            Self::BankName => "Bank Name",
        }
    }

    pub fn as_key(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Reason => "reason",
            Self::Amount => "amount",
            Self::AccountNumber => "account_number",
            Self::AccountName => "account_name",
            Self::BankName => "bank_name",
        }
    }
}

/// In-progress answers for one user. Never exported until [`SubmissionDraft::complete`]
/// succeeds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionDraft {
    pub name: Option<String>,
    pub reason: Option<String>,
    pub amount: Option<String>,
    pub account_number: Option<String>,
    pub account_name: Option<String>,
    pub bank_name: Option<String>,
    /// Set when name and account details were copied from the previous submission.
    pub prefilled: bool,
}

impl SubmissionDraft {
    pub fn get(&self, field: FormField) -> Option<&str> {
        let value = match field {
            FormField::Name => &self.name,
            FormField::Reason => &self.reason,
            FormField::Amount => &self.amount,
            FormField::AccountNumber => &self.account_number,
            FormField::AccountName => &self.account_name,
            FormField::BankName => &self.bank_name,
        };
        value.as_deref()
    }

    pub fn set(&mut self, field: FormField, value: impl Into<String>) {
        let value = Some(value.into());
        match field {
            FormField::Name => self.name = value,
            FormField::Reason => self.reason = value,
            FormField::Amount => self.amount = value,
            FormField::AccountNumber => self.account_number = value,
            FormField::AccountName => self.account_name = value,
            FormField::BankName => self.bank_name = value,
        }
    }

    pub fn missing_fields(&self) -> Vec<FormField> {
        FormField::ORDERED.into_iter().filter(|field| self.get(*field).is_none()).collect()
    }

    pub fn is_empty(&self) -> bool {
        FormField::ORDERED.into_iter().all(|field| self.get(field).is_none())
    }

    /// Copies identity and payout details from an earlier submission, leaving the
    /// per-request fields (reason, amount) blank.
    pub fn prefill_from(&mut self, previous: &Submission) {
        self.name = Some(previous.name.clone());
        self.account_number = Some(previous.account_number.clone());
        self.account_name = Some(previous.account_name.clone());
        self.bank_name = Some(previous.bank_name.clone());
        self.reason = None;
        self.amount = None;
        self.prefilled = true;
    }

    pub fn complete(
        &self,
        user_id: UserId,
        submitted_at: DateTime<Utc>,
    ) -> Result<Submission, DomainError> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(DomainError::IncompleteSubmission {
                missing_fields: missing.iter().map(|field| field.as_key().to_owned()).collect(),
            });
        }

        let field = |field: FormField| self.get(field).unwrap_or_default().to_owned();
        Ok(Submission {
            user_id,
            name: field(FormField::Name),
            reason: field(FormField::Reason),
            amount: field(FormField::Amount),
            account_number: field(FormField::AccountNumber),
            account_name: field(FormField::AccountName),
            bank_name: field(FormField::BankName),
            submitted_at,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub user_id: UserId,
    pub name: String,
    pub reason: String,
    /// Raw text as typed by the user; only parsed for the escalation check.
    pub amount: String,
    pub account_number: String,
    pub account_name: String,
    pub bank_name: String,
    pub submitted_at: DateTime<Utc>,
}

impl Submission {
    pub fn field(&self, field: FormField) -> &str {
        match field {
            FormField::Name => &self.name,
            FormField::Reason => &self.reason,
            FormField::Amount => &self.amount,
            FormField::AccountNumber => &self.account_number,
            FormField::AccountName => &self.account_name,
            FormField::BankName => &self.bank_name,
        }
    }

    pub fn timestamp_label(&self) -> String {
        self.submitted_at.format("%Y-%m-%d %H:%M").to_string()
    }
}
