pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod export;
pub mod flows;
pub mod mail;
pub mod notify;
pub mod session;

pub use domain::submission::{FormField, Submission, SubmissionDraft, UserId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use export::{ExportPipeline, ExportReport, ExportVerdict, SinkKind, SinkOutcome};
pub use flows::{ConversationState, FlowEngine, FlowEvent, PaymentFormFlow};
pub use notify::{EscalationDecision, EscalationPolicy};
pub use session::{Session, SessionStore};
