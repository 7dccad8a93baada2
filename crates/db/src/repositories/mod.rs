use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use reviewdesk_core::domain::feedback::{
    FeedbackItem, ItemKind, ItemQuery, NewQuestion, NewReview, Question, ReplyTarget, Review,
};
use reviewdesk_core::domain::user::{AdminLevel, FeedbackUser, UserId};

pub mod feedback;
pub mod memory;

pub use feedback::SqlFeedbackRepository;
pub use memory::InMemoryFeedbackRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Durable store for users, reviews and questions.
#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    async fn find_user(&self, id: UserId) -> Result<Option<FeedbackUser>, RepositoryError>;

    /// Creates the user on first sight and refreshes the username after.
    async fn register_user(
        &self,
        id: UserId,
        username: Option<&str>,
    ) -> Result<FeedbackUser, RepositoryError>;

    /// Creates the user when missing.
    async fn set_admin_level(&self, id: UserId, level: AdminLevel) -> Result<(), RepositoryError>;

    /// Returns `false` when the user is unknown.
    async fn ban_user(&self, id: UserId, reason: &str) -> Result<bool, RepositoryError>;

    async fn unban_user(&self, id: UserId) -> Result<bool, RepositoryError>;

    async fn list_admins(&self) -> Result<Vec<UserId>, RepositoryError>;

    async fn create_review(&self, review: NewReview) -> Result<Review, RepositoryError>;

    async fn create_question(&self, question: NewQuestion) -> Result<Question, RepositoryError>;

    async fn count_reviews_since(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<u32, RepositoryError>;

    /// Items matching `query`, ordered by creation time as requested.
    async fn list_items(&self, query: ItemQuery) -> Result<Vec<FeedbackItem>, RepositoryError>;

    async fn has_answered(&self, user: UserId, kind: ItemKind) -> Result<bool, RepositoryError>;

    async fn find_item(&self, target: ReplyTarget)
        -> Result<Option<FeedbackItem>, RepositoryError>;

    /// Stores an admin response. Returns `false` when the item is missing or
    /// was answered in the meantime.
    async fn record_response(
        &self,
        target: ReplyTarget,
        response: &str,
    ) -> Result<bool, RepositoryError>;
}
