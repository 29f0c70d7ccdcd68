use thiserror::Error;

use crate::flows::FlowTransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("submission is missing required fields: {missing_fields:?}")]
    IncompleteSubmission { missing_fields: Vec<String> },
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "Your application could not be processed. Use `/form` to start again."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        let Self::BadRequest { correlation_id, .. } = self;
        correlation_id
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        match self {
            Self::Domain(error) => InterfaceError::BadRequest {
                message: error.to_string(),
                correlation_id: correlation_id.into(),
            },
        }
    }
}
