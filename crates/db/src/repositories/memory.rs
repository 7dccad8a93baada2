use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use reviewdesk_core::domain::feedback::{
    FeedbackItem, ItemId, ItemKind, ItemQuery, NewQuestion, NewReview, Question, ReplyTarget,
    Review, SortOrder,
};
use reviewdesk_core::domain::user::{AdminLevel, FeedbackUser, UserId};

use super::{FeedbackRepository, RepositoryError};

#[derive(Default)]
struct State {
    users: HashMap<UserId, FeedbackUser>,
    reviews: Vec<Review>,
    questions: Vec<Question>,
    next_id: i64,
}

impl State {
    fn allocate_id(&mut self) -> ItemId {
        self.next_id += 1;
        ItemId(self.next_id)
    }

    fn ensure_user(&mut self, id: UserId, username: Option<&str>) -> &mut FeedbackUser {
        self.users
            .entry(id)
            .or_insert_with(|| FeedbackUser::new(id, username.map(str::to_owned)))
    }

    fn items(&self, kind: ItemKind) -> Vec<FeedbackItem> {
        match kind {
            ItemKind::Review => self.reviews.iter().cloned().map(FeedbackItem::Review).collect(),
            ItemKind::Question => {
                self.questions.iter().cloned().map(FeedbackItem::Question).collect()
            }
        }
    }

    fn response_slot(&mut self, target: ReplyTarget) -> Option<&mut Option<String>> {
        match target.kind {
            ItemKind::Review => self
                .reviews
                .iter_mut()
                .find(|review| review.id == target.id)
                .map(|review| &mut review.admin_response),
            ItemKind::Question => self
                .questions
                .iter_mut()
                .find(|question| question.id == target.id)
                .map(|question| &mut question.admin_response),
        }
    }
}

/// Process-local store used by tests and by runs without a database.
#[derive(Default)]
pub struct InMemoryFeedbackRepository {
    state: RwLock<State>,
}

impl InMemoryFeedbackRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl FeedbackRepository for InMemoryFeedbackRepository {
    async fn find_user(&self, id: UserId) -> Result<Option<FeedbackUser>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn register_user(
        &self,
        id: UserId,
        username: Option<&str>,
    ) -> Result<FeedbackUser, RepositoryError> {
        let mut state = self.state.write().await;
        let user = state.ensure_user(id, username);
        user.username = username.map(str::to_owned);
        Ok(user.clone())
    }

    async fn set_admin_level(&self, id: UserId, level: AdminLevel) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.ensure_user(id, None).admin_level = level;
        Ok(())
    }

    async fn ban_user(&self, id: UserId, reason: &str) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        Ok(match state.users.get_mut(&id) {
            Some(user) => {
                user.is_banned = true;
                user.ban_reason = Some(reason.to_owned());
                true
            }
            None => false,
        })
    }

    async fn unban_user(&self, id: UserId) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        Ok(match state.users.get_mut(&id) {
            Some(user) => {
                user.is_banned = false;
                user.ban_reason = None;
                true
            }
            None => false,
        })
    }

    async fn list_admins(&self) -> Result<Vec<UserId>, RepositoryError> {
        let state = self.state.read().await;
        let mut admins: Vec<UserId> = state
            .users
            .values()
            .filter(|user| user.admin_level.is_admin())
            .map(|user| user.id)
            .collect();
        admins.sort();
        Ok(admins)
    }

    async fn create_review(&self, review: NewReview) -> Result<Review, RepositoryError> {
        let mut state = self.state.write().await;
        state.ensure_user(review.user_id, review.username.as_deref());
        let stored = Review {
            id: state.allocate_id(),
            user_id: review.user_id,
            username: review.username,
            rating: review.rating,
            text: review.text,
            admin_response: None,
            created_at: Utc::now(),
        };
        state.reviews.push(stored.clone());
        Ok(stored)
    }

    async fn create_question(&self, question: NewQuestion) -> Result<Question, RepositoryError> {
        let mut state = self.state.write().await;
        state.ensure_user(question.user_id, question.username.as_deref());
        let stored = Question {
            id: state.allocate_id(),
            user_id: question.user_id,
            username: question.username,
            text: question.text,
            admin_response: None,
            created_at: Utc::now(),
        };
        state.questions.push(stored.clone());
        Ok(stored)
    }

    async fn count_reviews_since(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<u32, RepositoryError> {
        let state = self.state.read().await;
        let count = state
            .reviews
            .iter()
            .filter(|review| review.user_id == user && review.created_at >= since)
            .count();
        u32::try_from(count)
            .map_err(|_| RepositoryError::Decode(format!("invalid review count {count}")))
    }

    async fn list_items(&self, query: ItemQuery) -> Result<Vec<FeedbackItem>, RepositoryError> {
        let state = self.state.read().await;
        let mut items: Vec<FeedbackItem> = state
            .items(query.kind)
            .into_iter()
            .filter(|item| query.author.map_or(true, |author| item.author() == author))
            .filter(|item| query.filter.matches(item.admin_response()))
            .collect();

        items.sort_by_key(|item| (item.created_at(), item.id()));
        if query.sort == SortOrder::Newest {
            items.reverse();
        }
        Ok(items)
    }

    async fn has_answered(&self, user: UserId, kind: ItemKind) -> Result<bool, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.items(kind).iter().any(|item| item.author() == user && item.is_answered()))
    }

    async fn find_item(
        &self,
        target: ReplyTarget,
    ) -> Result<Option<FeedbackItem>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.items(target.kind).into_iter().find(|item| item.id() == target.id))
    }

    async fn record_response(
        &self,
        target: ReplyTarget,
        response: &str,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        match state.response_slot(target) {
            Some(slot) if slot.is_none() => {
                *slot = Some(response.to_owned());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
