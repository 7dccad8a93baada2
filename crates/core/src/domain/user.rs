use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Administrative rank stored with each user. Higher levels include the
/// rights of the lower ones.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AdminLevel(u8);

impl AdminLevel {
    pub const USER: Self = Self(0);
    /// May browse every review and question.
    pub const VIEWER: Self = Self(1);
    /// May answer reviews and questions.
    pub const RESPONDER: Self = Self(2);
    pub const MANAGER: Self = Self(3);
    pub const SUPER_ADMIN: Self = Self(4);

    pub fn new(level: u8) -> Result<Self, DomainError> {
        if level > Self::SUPER_ADMIN.0 {
            return Err(DomainError::InvalidAdminLevel(level));
        }
        Ok(Self(level))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_admin(self) -> bool {
        self >= Self::VIEWER
    }

    pub fn allows(self, required: AdminLevel) -> bool {
        self >= required
    }
}

impl fmt::Display for AdminLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackUser {
    pub id: UserId,
    pub username: Option<String>,
    pub admin_level: AdminLevel,
    pub is_banned: bool,
    pub ban_reason: Option<String>,
}

impl FeedbackUser {
    pub fn new(id: UserId, username: Option<String>) -> Self {
        Self { id, username, admin_level: AdminLevel::USER, is_banned: false, ban_reason: None }
    }

    pub fn display_name(&self) -> String {
        match &self.username {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("id{}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AdminLevel, FeedbackUser, UserId};
    use crate::errors::DomainError;

    #[test]
    fn admin_levels_are_ordered() {
        assert!(AdminLevel::SUPER_ADMIN.allows(AdminLevel::RESPONDER));
        assert!(AdminLevel::RESPONDER.allows(AdminLevel::VIEWER));
        assert!(!AdminLevel::VIEWER.allows(AdminLevel::RESPONDER));
        assert!(!AdminLevel::USER.is_admin());
        assert!(AdminLevel::VIEWER.is_admin());
    }

    #[test]
    fn admin_level_rejects_values_above_super_admin() {
        assert_eq!(AdminLevel::new(4), Ok(AdminLevel::SUPER_ADMIN));
        assert_eq!(AdminLevel::new(5), Err(DomainError::InvalidAdminLevel(5)));
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let named = FeedbackUser::new(UserId(7), Some("alice".to_owned()));
        let blank = FeedbackUser::new(UserId(8), Some("  ".to_owned()));
        let anonymous = FeedbackUser::new(UserId(9), None);

        assert_eq!(named.display_name(), "alice");
        assert_eq!(blank.display_name(), "id8");
        assert_eq!(anonymous.display_name(), "id9");
    }
}
