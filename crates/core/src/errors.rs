use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("rating must be between 1 and 5 stars, got {0}")]
    InvalidRating(u8),
    #[error("admin level must be between 0 and 4, got {0}")]
    InvalidAdminLevel(u8),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("persistence failure: {0}")]
    Persistence(String),
}

/// Error shape shown at the chat boundary. The message is logged, the
/// user only ever sees [`InterfaceError::user_message`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("temporarily unavailable: {message}")]
    Unavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => {
                "Something went wrong on our side. Please try again in a moment."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Unavailable { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        match self {
            Self::Persistence(message) => InterfaceError::Unavailable { message, correlation_id },
        }
    }
}
