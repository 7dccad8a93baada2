use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Star rating attached to every review.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(stars: u8) -> Result<Self, DomainError> {
        if (Self::MIN..=Self::MAX).contains(&stars) {
            Ok(Self(stars))
        } else {
            Err(DomainError::InvalidRating(stars))
        }
    }

    pub fn stars(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Rating> {
        (Self::MIN..=Self::MAX).map(Rating)
    }
}

impl TryFrom<u8> for Rating {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(value: Rating) -> Self {
        value.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Review,
    Question,
}

impl ItemKind {
    pub const ALL: [ItemKind; 2] = [ItemKind::Review, ItemKind::Question];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Review => "reviews",
            Self::Question => "questions",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "reviews" => Some(Self::Review),
            "questions" => Some(Self::Question),
            _ => None,
        }
    }
}

/// Which records a browse request should include, keyed on whether an
/// administrator has answered them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFilter {
    All,
    Answered,
    Unanswered,
}

impl ResponseFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Answered => "responses",
            Self::Unanswered => "unanswered",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "all" => Some(Self::All),
            "responses" => Some(Self::Answered),
            "unanswered" => Some(Self::Unanswered),
            _ => None,
        }
    }

    pub fn matches(self, admin_response: Option<&str>) -> bool {
        match self {
            Self::All => true,
            Self::Answered => admin_response.is_some(),
            Self::Unanswered => admin_response.is_none(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Newest,
    Oldest,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "new",
            Self::Oldest => "old",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(Self::Newest),
            "old" => Some(Self::Oldest),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ItemId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub rating: Rating,
    pub text: Option<String>,
    pub admin_response: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: ItemId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub text: String,
    pub admin_response: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackItem {
    Review(Review),
    Question(Question),
}

impl FeedbackItem {
    pub fn id(&self) -> ItemId {
        match self {
            Self::Review(review) => review.id,
            Self::Question(question) => question.id,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Review(_) => ItemKind::Review,
            Self::Question(_) => ItemKind::Question,
        }
    }

    pub fn author(&self) -> UserId {
        match self {
            Self::Review(review) => review.user_id,
            Self::Question(question) => question.user_id,
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Review(review) => review.username.as_deref(),
            Self::Question(question) => question.username.as_deref(),
        }
    }

    pub fn admin_response(&self) -> Option<&str> {
        match self {
            Self::Review(review) => review.admin_response.as_deref(),
            Self::Question(question) => question.admin_response.as_deref(),
        }
    }

    pub fn is_answered(&self) -> bool {
        self.admin_response().is_some()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::Review(review) => review.created_at,
            Self::Question(question) => question.created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewReview {
    pub user_id: UserId,
    pub username: Option<String>,
    pub rating: Rating,
    pub text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewQuestion {
    pub user_id: UserId,
    pub username: Option<String>,
    pub text: String,
}

/// Selection of records for a browse view. `author: None` means every user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ItemQuery {
    pub author: Option<UserId>,
    pub kind: ItemKind,
    pub filter: ResponseFilter,
    pub sort: SortOrder,
}

/// The record an administrator is currently answering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplyTarget {
    pub kind: ItemKind,
    pub id: ItemId,
}
