//! Per-user, single-use values that bridge two stateless interactions:
//! the rating picked before the review text arrives, and the record an
//! administrator is replying to. Never persisted.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::feedback::{Rating, ReplyTarget};
use crate::domain::user::UserId;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Pending {
    rating: Option<Rating>,
    reply_target: Option<ReplyTarget>,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.rating.is_none() && self.reply_target.is_none()
    }
}

#[derive(Debug, Default)]
pub struct CorrelationStore {
    entries: Mutex<HashMap<UserId, Pending>>,
}

impl CorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last writer wins.
    pub fn set_pending_rating(&self, user: UserId, rating: Rating) {
        self.entries().entry(user).or_default().rating = Some(rating);
    }

    /// Puts a rating back after a failed submission unless a newer one
    /// was set in the meantime.
    pub fn restore_pending_rating(&self, user: UserId, rating: Rating) {
        let mut entries = self.entries();
        let pending = entries.entry(user).or_default();
        if pending.rating.is_none() {
            pending.rating = Some(rating);
        }
    }

    pub fn take_pending_rating(&self, user: UserId) -> Option<Rating> {
        self.take(user, |pending| pending.rating.take())
    }

    pub fn set_pending_reply_target(&self, user: UserId, target: ReplyTarget) {
        self.entries().entry(user).or_default().reply_target = Some(target);
    }

    pub fn take_pending_reply_target(&self, user: UserId) -> Option<ReplyTarget> {
        self.take(user, |pending| pending.reply_target.take())
    }

    pub fn peek_pending_rating(&self, user: UserId) -> Option<Rating> {
        self.entries().get(&user).and_then(|pending| pending.rating)
    }

    pub fn clear(&self, user: UserId) {
        self.entries().remove(&user);
    }

    /// Number of users with anything pending.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn take<T>(&self, user: UserId, field: impl FnOnce(&mut Pending) -> Option<T>) -> Option<T> {
        let mut entries = self.entries();
        let pending = entries.get_mut(&user)?;
        let taken = field(pending);
        if pending.is_empty() {
            entries.remove(&user);
        }
        taken
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<UserId, Pending>> {
        // No operation can leave a half-written entry behind, so a poisoned
        // map is still consistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
