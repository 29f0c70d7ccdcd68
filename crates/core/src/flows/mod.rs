pub mod engine;
pub mod states;

pub use engine::{FlowDefinition, FlowEngine, FlowTransitionError, PaymentFormFlow};
pub use states::{
    ConversationState, FlowAction, FlowContext, FlowEvent, FlowType, Prompt, TransitionOutcome,
};
