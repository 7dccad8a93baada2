pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod navigation;

pub use domain::feedback::{
    FeedbackItem, ItemId, ItemKind, ItemQuery, NewQuestion, NewReview, Question, Rating,
    ReplyTarget, ResponseFilter, Review, SortOrder,
};
pub use domain::user::{AdminLevel, FeedbackUser, UserId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{FlowEngine, FlowTransitionError, NavEvent, Session, Stage};
pub use navigation::{ActionToken, CorrelationStore, DecodeError, PageLimits};
