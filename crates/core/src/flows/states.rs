use serde::{Deserialize, Serialize};

use crate::domain::feedback::{
    FeedbackItem, ItemKind, Rating, ReplyTarget, ResponseFilter, SortOrder,
};
use crate::domain::user::{AdminLevel, UserId};
use crate::navigation::ActionToken;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[default]
    Root,
    AwaitingRatingChoice,
    AwaitingReviewText,
    AwaitingQuestionText,
    AwaitingHistoryType,
    AwaitingFilterType,
    AwaitingSortType,
    ViewingPage,
    AwaitingAdminReplyText,
}

impl Stage {
    pub fn is_browsing(self) -> bool {
        matches!(
            self,
            Self::AwaitingHistoryType
                | Self::AwaitingFilterType
                | Self::AwaitingSortType
                | Self::ViewingPage
        )
    }

    pub fn expects_text(self) -> bool {
        matches!(
            self,
            Self::AwaitingReviewText | Self::AwaitingQuestionText | Self::AwaitingAdminReplyText
        )
    }
}

/// Whose records a browse session covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BrowseScope {
    Own,
    All,
}

/// Everything needed to fetch a browse result set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BrowseKey {
    pub scope: BrowseScope,
    pub kind: ItemKind,
    pub filter: ResponseFilter,
    pub sort: SortOrder,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selections {
    pub scope: Option<BrowseScope>,
    pub history_type: Option<ItemKind>,
    pub filter_type: Option<ResponseFilter>,
    pub sort_type: Option<SortOrder>,
    pub current_page_index: Option<usize>,
}

impl Selections {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn browse_key(&self) -> Option<BrowseKey> {
        Some(BrowseKey {
            scope: self.scope?,
            kind: self.history_type?,
            filter: self.filter_type?,
            sort: self.sort_type?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavEvent {
    Start,
    LeaveReview,
    RatingChosen(Rating),
    SkipText,
    AskQuestion,
    OpenHistory,
    HistoryTypeChosen { scope: BrowseScope, kind: ItemKind },
    FilterChosen { scope: BrowseScope, kind: ItemKind, filter: ResponseFilter },
    SortChosen(BrowseKey),
    PageRequested { key: BrowseKey, index: usize },
    BackToFilter(ItemKind),
    BackToRoot,
    ReplyRequested(ReplyTarget),
    ReplyCancelled,
    TextSubmitted,
}

impl NavEvent {
    /// Maps a decoded token to the event it drives. Tokens that never touch
    /// the session (`noop`, `dismiss`) map to `None`.
    pub fn from_token(token: &ActionToken) -> Option<Self> {
        use BrowseScope::{All, Own};

        let event = match *token {
            ActionToken::LeaveReview => Self::LeaveReview,
            ActionToken::Rate(rating) => Self::RatingChosen(rating),
            ActionToken::SkipText => Self::SkipText,
            ActionToken::Ask => Self::AskQuestion,
            ActionToken::HistoryRoot => Self::OpenHistory,
            ActionToken::HistoryType(kind) => Self::HistoryTypeChosen { scope: Own, kind },
            ActionToken::AdminHistory(kind) => Self::HistoryTypeChosen { scope: All, kind },
            ActionToken::Filter { filter, kind } => Self::FilterChosen { scope: Own, kind, filter },
            ActionToken::AdminFilter { filter, kind } => {
                Self::FilterChosen { scope: All, kind, filter }
            }
            ActionToken::Sort { sort, kind, filter } => {
                Self::SortChosen(BrowseKey { scope: Own, kind, filter, sort })
            }
            ActionToken::AdminSort { sort, kind, filter } => {
                Self::SortChosen(BrowseKey { scope: All, kind, filter, sort })
            }
            ActionToken::Page { index, kind, filter, sort } => Self::PageRequested {
                key: BrowseKey { scope: Own, kind, filter, sort },
                index: index as usize,
            },
            ActionToken::AdminPage { index, kind, filter, sort } => Self::PageRequested {
                key: BrowseKey { scope: All, kind, filter, sort },
                index: index as usize,
            },
            ActionToken::BackToFilter(kind) => Self::BackToFilter(kind),
            ActionToken::BackToRoot => Self::BackToRoot,
            ActionToken::AdminReply { id, kind } => Self::ReplyRequested(ReplyTarget { kind, id }),
            ActionToken::AdminCancelReply => Self::ReplyCancelled,
            ActionToken::Dismiss | ActionToken::Noop => return None,
        };
        Some(event)
    }
}

/// Whether the record named by a reply request can still be answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyTargetState {
    Missing,
    Answered,
    Open,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavContext {
    pub admin_level: AdminLevel,
    pub banned: bool,
    pub review_quota_exhausted: bool,
    pub reply_target: Option<ReplyTargetState>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavAction {
    RegisterUser,
    StorePendingRating(Rating),
    SubmitReview { with_text: bool },
    SubmitQuestion,
    NotifyAdmins,
    LoadItems,
    StoreReplyTarget(ReplyTarget),
    SubmitReply,
    ClearCorrelation,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: Stage,
    pub to: Stage,
    pub event: NavEvent,
    pub actions: Vec<NavAction>,
}

/// Conversational state of one user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub stage: Stage,
    pub selections: Selections,
    pub cached_items: Vec<FeedbackItem>,
}

impl Session {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            stage: Stage::Root,
            selections: Selections::default(),
            cached_items: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.stage = Stage::Root;
        self.selections = Selections::default();
        self.cached_items.clear();
    }

    /// Moves to the outcome's stage and updates the selections the event
    /// carries. The cache is dropped whenever the browse key changes or the
    /// session leaves `ViewingPage`.
    pub fn advance(&mut self, outcome: &TransitionOutcome) {
        if outcome.to == Stage::Root {
            self.reset();
            return;
        }

        let previous_key = self.selections.browse_key();
        match &outcome.event {
            NavEvent::OpenHistory => self.selections = Selections::default(),
            NavEvent::HistoryTypeChosen { scope, kind } => {
                self.selections = Selections {
                    scope: Some(*scope),
                    history_type: Some(*kind),
                    ..Selections::default()
                };
            }
            NavEvent::FilterChosen { scope, kind, filter } => {
                self.selections = Selections {
                    scope: Some(*scope),
                    history_type: Some(*kind),
                    filter_type: Some(*filter),
                    ..Selections::default()
                };
            }
            NavEvent::SortChosen(key) => {
                self.cached_items.clear();
                self.select(*key, 0);
            }
            NavEvent::PageRequested { key, index } => self.select(*key, *index),
            NavEvent::BackToFilter(kind) => {
                self.selections = Selections {
                    scope: Some(BrowseScope::Own),
                    history_type: Some(*kind),
                    ..Selections::default()
                };
            }
            _ => {}
        }

        self.stage = outcome.to;
        if self.stage != Stage::ViewingPage || self.selections.browse_key() != previous_key {
            self.cached_items.clear();
        }
    }

    fn select(&mut self, key: BrowseKey, index: usize) {
        self.selections = Selections {
            scope: Some(key.scope),
            history_type: Some(key.kind),
            filter_type: Some(key.filter),
            sort_type: Some(key.sort),
            current_page_index: Some(index),
        };
    }
}
