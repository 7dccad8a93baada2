use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as SessionLock;

use reviewdesk_core::domain::user::UserId;
use reviewdesk_core::flows::{Session, Stage};

pub type SessionHandle = Arc<SessionLock<Session>>;

/// Per-user sessions. The outer map lock is only held to look up or insert a
/// handle; all session work happens under the per-user lock.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<UserId, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the user's session, creating a fresh Root session on first use.
    pub fn entry(&self, user: UserId) -> SessionHandle {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.entry(user).or_insert_with(|| Arc::new(SessionLock::new(Session::new(user)))).clone()
    }

    pub fn get(&self, user: UserId) -> Option<SessionHandle> {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.get(&user).cloned()
    }

    pub fn remove(&self, user: UserId) -> Option<SessionHandle> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(&user)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops sessions sitting at Root that no handler is holding. Returns how
    /// many were removed.
    pub fn prune_idle(&self) -> usize {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, handle| {
            if Arc::strong_count(handle) > 1 {
                return true;
            }
            match handle.try_lock() {
                Ok(session) => session.stage != Stage::Root,
                Err(_) => true,
            }
        });
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use reviewdesk_core::domain::user::UserId;
    use reviewdesk_core::flows::Stage;

    use super::SessionRegistry;

    #[test]
    fn entry_creates_once_and_returns_the_same_handle() {
        let registry = SessionRegistry::new();

        let first = registry.entry(UserId(1));
        let second = registry.entry(UserId(1));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
        assert!(registry.get(UserId(2)).is_none());
    }

    #[tokio::test]
    async fn prune_idle_keeps_active_and_held_sessions() {
        let registry = SessionRegistry::new();
        drop(registry.entry(UserId(1)));
        registry.entry(UserId(2)).lock().await.stage = Stage::AwaitingReviewText;
        let held = registry.entry(UserId(3));

        assert_eq!(registry.prune_idle(), 1);
        assert!(registry.get(UserId(1)).is_none());
        assert!(registry.get(UserId(2)).is_some());
        assert!(registry.get(UserId(3)).is_some());

        drop(held);
        assert_eq!(registry.prune_idle(), 1);
        assert!(registry.remove(UserId(2)).is_some());
        assert!(registry.is_empty());
    }
}
