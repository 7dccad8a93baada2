pub mod correlation;
pub mod paginate;
pub mod token;

pub use correlation::CorrelationStore;
pub use paginate::{paginate, Page, PageLimits, PageView, Pages};
pub use token::{ActionToken, DecodeError, Verb, MAX_TOKEN_BYTES};
