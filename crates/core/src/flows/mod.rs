pub mod engine;
pub mod states;

pub use engine::{FeedbackFlow, FlowDefinition, FlowEngine, FlowTransitionError};
pub use states::{
    BrowseKey, BrowseScope, NavAction, NavContext, NavEvent, ReplyTargetState, Selections,
    Session, Stage, TransitionOutcome,
};
