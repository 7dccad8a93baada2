//! Compact action tokens carried in keyboard button payloads.
//!
//! A token is a verb followed by `:`-separated positional arguments. Every
//! verb has a fixed arity and every argument is drawn from a closed
//! enumeration or is a decimal integer, so no argument can contain the
//! delimiter and `decode(encode(token)) == token` holds for every token.

use std::fmt;

use thiserror::Error;

use crate::domain::feedback::{ItemId, ItemKind, Rating, ResponseFilter, SortOrder};

pub const DELIMITER: char = ':';

/// Callback payload ceiling shared by the common chat platforms.
pub const MAX_TOKEN_BYTES: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    LeaveReview,
    Rate,
    SkipText,
    Ask,
    HistoryRoot,
    HistoryType,
    Filter,
    Sort,
    Page,
    BackToFilter,
    BackToRoot,
    AdminHistory,
    AdminFilter,
    AdminSort,
    AdminPage,
    AdminReply,
    AdminCancelReply,
    Dismiss,
    Noop,
}

impl Verb {
    pub const ALL: [Verb; 19] = [
        Verb::LeaveReview,
        Verb::Rate,
        Verb::SkipText,
        Verb::Ask,
        Verb::HistoryRoot,
        Verb::HistoryType,
        Verb::Filter,
        Verb::Sort,
        Verb::Page,
        Verb::BackToFilter,
        Verb::BackToRoot,
        Verb::AdminHistory,
        Verb::AdminFilter,
        Verb::AdminSort,
        Verb::AdminPage,
        Verb::AdminReply,
        Verb::AdminCancelReply,
        Verb::Dismiss,
        Verb::Noop,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LeaveReview => "leave-review",
            Self::Rate => "rate",
            Self::SkipText => "skip-text",
            Self::Ask => "ask",
            Self::HistoryRoot => "history-root",
            Self::HistoryType => "history-type",
            Self::Filter => "filter",
            Self::Sort => "sort",
            Self::Page => "page",
            Self::BackToFilter => "back-to-filter",
            Self::BackToRoot => "back-to-root",
            Self::AdminHistory => "admin-history",
            Self::AdminFilter => "admin-filter",
            Self::AdminSort => "admin-sort",
            Self::AdminPage => "admin-page",
            Self::AdminReply => "admin-reply",
            Self::AdminCancelReply => "admin-cancel-reply",
            Self::Dismiss => "dismiss",
            Self::Noop => "noop",
        }
    }

    /// Number of positional arguments following the verb.
    pub fn arity(self) -> usize {
        match self {
            Self::LeaveReview
            | Self::SkipText
            | Self::Ask
            | Self::HistoryRoot
            | Self::BackToRoot
            | Self::AdminCancelReply
            | Self::Dismiss
            | Self::Noop => 0,
            Self::Rate | Self::HistoryType | Self::BackToFilter | Self::AdminHistory => 1,
            Self::Filter | Self::AdminFilter | Self::AdminReply => 2,
            Self::Sort | Self::AdminSort => 3,
            Self::Page | Self::AdminPage => 4,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|verb| verb.as_str() == value)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionToken {
    LeaveReview,
    Rate(Rating),
    SkipText,
    Ask,
    HistoryRoot,
    HistoryType(ItemKind),
    Filter { filter: ResponseFilter, kind: ItemKind },
    Sort { sort: SortOrder, kind: ItemKind, filter: ResponseFilter },
    Page { index: u32, kind: ItemKind, filter: ResponseFilter, sort: SortOrder },
    BackToFilter(ItemKind),
    BackToRoot,
    AdminHistory(ItemKind),
    AdminFilter { filter: ResponseFilter, kind: ItemKind },
    AdminSort { sort: SortOrder, kind: ItemKind, filter: ResponseFilter },
    AdminPage { index: u32, kind: ItemKind, filter: ResponseFilter, sort: SortOrder },
    AdminReply { id: ItemId, kind: ItemKind },
    AdminCancelReply,
    Dismiss,
    Noop,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown action verb in `{0}`")]
    UnknownVerb(String),
    #[error("malformed arguments for `{verb}`: {detail}")]
    MalformedArgs { verb: Verb, detail: String },
}

impl ActionToken {
    pub fn verb(&self) -> Verb {
        match self {
            Self::LeaveReview => Verb::LeaveReview,
            Self::Rate(_) => Verb::Rate,
            Self::SkipText => Verb::SkipText,
            Self::Ask => Verb::Ask,
            Self::HistoryRoot => Verb::HistoryRoot,
            Self::HistoryType(_) => Verb::HistoryType,
            Self::Filter { .. } => Verb::Filter,
            Self::Sort { .. } => Verb::Sort,
            Self::Page { .. } => Verb::Page,
            Self::BackToFilter(_) => Verb::BackToFilter,
            Self::BackToRoot => Verb::BackToRoot,
            Self::AdminHistory(_) => Verb::AdminHistory,
            Self::AdminFilter { .. } => Verb::AdminFilter,
            Self::AdminSort { .. } => Verb::AdminSort,
            Self::AdminPage { .. } => Verb::AdminPage,
            Self::AdminReply { .. } => Verb::AdminReply,
            Self::AdminCancelReply => Verb::AdminCancelReply,
            Self::Dismiss => Verb::Dismiss,
            Self::Noop => Verb::Noop,
        }
    }

    /// Positional arguments in wire order.
    pub fn args(&self) -> Vec<String> {
        match *self {
            Self::LeaveReview
            | Self::SkipText
            | Self::Ask
            | Self::HistoryRoot
            | Self::BackToRoot
            | Self::AdminCancelReply
            | Self::Dismiss
            | Self::Noop => Vec::new(),
            Self::Rate(rating) => vec![rating.to_string()],
            Self::HistoryType(kind) | Self::BackToFilter(kind) | Self::AdminHistory(kind) => {
                vec![kind.as_str().to_owned()]
            }
            Self::Filter { filter, kind } | Self::AdminFilter { filter, kind } => {
                vec![filter.as_str().to_owned(), kind.as_str().to_owned()]
            }
            Self::Sort { sort, kind, filter } | Self::AdminSort { sort, kind, filter } => vec![
                sort.as_str().to_owned(),
                kind.as_str().to_owned(),
                filter.as_str().to_owned(),
            ],
            Self::Page { index, kind, filter, sort }
            | Self::AdminPage { index, kind, filter, sort } => vec![
                index.to_string(),
                kind.as_str().to_owned(),
                filter.as_str().to_owned(),
                sort.as_str().to_owned(),
            ],
            Self::AdminReply { id, kind } => vec![id.to_string(), kind.as_str().to_owned()],
        }
    }

    pub fn encode(&self) -> String {
        let mut wire = self.verb().as_str().to_owned();
        for arg in self.args() {
            wire.push(DELIMITER);
            wire.push_str(&arg);
        }
        wire
    }

    pub fn decode(wire: &str) -> Result<Self, DecodeError> {
        let mut parts = wire.split(DELIMITER);
        let head = parts.next().unwrap_or_default();
        let verb = Verb::parse(head).ok_or_else(|| DecodeError::UnknownVerb(wire.to_owned()))?;
        let args: Vec<&str> = parts.collect();

        if args.len() != verb.arity() {
            return Err(DecodeError::MalformedArgs {
                verb,
                detail: format!("expected {} argument(s), got {}", verb.arity(), args.len()),
            });
        }

        let fields = Fields { verb, args: &args };
        let token = match verb {
            Verb::LeaveReview => Self::LeaveReview,
            Verb::Rate => Self::Rate(fields.rating(0)?),
            Verb::SkipText => Self::SkipText,
            Verb::Ask => Self::Ask,
            Verb::HistoryRoot => Self::HistoryRoot,
            Verb::HistoryType => Self::HistoryType(fields.kind(0)?),
            Verb::Filter => {
                Self::Filter { filter: fields.user_filter(0)?, kind: fields.kind(1)? }
            }
            Verb::Sort => Self::Sort {
                sort: fields.sort(0)?,
                kind: fields.kind(1)?,
                filter: fields.user_filter(2)?,
            },
            Verb::Page => Self::Page {
                index: fields.index(0)?,
                kind: fields.kind(1)?,
                filter: fields.user_filter(2)?,
                sort: fields.sort(3)?,
            },
            Verb::BackToFilter => Self::BackToFilter(fields.kind(0)?),
            Verb::BackToRoot => Self::BackToRoot,
            Verb::AdminHistory => Self::AdminHistory(fields.kind(0)?),
            Verb::AdminFilter => {
                Self::AdminFilter { filter: fields.admin_filter(0)?, kind: fields.kind(1)? }
            }
            Verb::AdminSort => Self::AdminSort {
                sort: fields.sort(0)?,
                kind: fields.kind(1)?,
                filter: fields.admin_filter(2)?,
            },
            Verb::AdminPage => Self::AdminPage {
                index: fields.index(0)?,
                kind: fields.kind(1)?,
                filter: fields.admin_filter(2)?,
                sort: fields.sort(3)?,
            },
            Verb::AdminReply => Self::AdminReply { id: fields.item_id(0)?, kind: fields.kind(1)? },
            Verb::AdminCancelReply => Self::AdminCancelReply,
            Verb::Dismiss => Self::Dismiss,
            Verb::Noop => Self::Noop,
        };

        Ok(token)
    }
}

impl fmt::Display for ActionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

struct Fields<'a> {
    verb: Verb,
    args: &'a [&'a str],
}

impl Fields<'_> {
    fn malformed(&self, position: usize, expected: &str) -> DecodeError {
        DecodeError::MalformedArgs {
            verb: self.verb,
            detail: format!(
                "argument {position} `{}` is not {expected}",
                self.args.get(position).copied().unwrap_or_default()
            ),
        }
    }

    fn raw(&self, position: usize) -> &str {
        self.args.get(position).copied().unwrap_or_default()
    }

    fn decimal(&self, position: usize) -> Option<u64> {
        let raw = self.raw(position);
        if raw.is_empty() || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
            return None;
        }
        raw.parse().ok()
    }

    fn rating(&self, position: usize) -> Result<Rating, DecodeError> {
        self.decimal(position)
            .and_then(|stars| u8::try_from(stars).ok())
            .and_then(|stars| Rating::new(stars).ok())
            .ok_or_else(|| self.malformed(position, "a rating between 1 and 5"))
    }

    fn index(&self, position: usize) -> Result<u32, DecodeError> {
        self.decimal(position)
            .and_then(|index| u32::try_from(index).ok())
            .ok_or_else(|| self.malformed(position, "a page index"))
    }

    fn item_id(&self, position: usize) -> Result<ItemId, DecodeError> {
        self.decimal(position)
            .and_then(|id| i64::try_from(id).ok())
            .map(ItemId)
            .ok_or_else(|| self.malformed(position, "an item id"))
    }

    fn kind(&self, position: usize) -> Result<ItemKind, DecodeError> {
        ItemKind::parse(self.raw(position))
            .ok_or_else(|| self.malformed(position, "reviews|questions"))
    }

    fn sort(&self, position: usize) -> Result<SortOrder, DecodeError> {
        SortOrder::parse(self.raw(position)).ok_or_else(|| self.malformed(position, "new|old"))
    }

    fn user_filter(&self, position: usize) -> Result<ResponseFilter, DecodeError> {
        match ResponseFilter::parse(self.raw(position)) {
            Some(filter @ (ResponseFilter::All | ResponseFilter::Answered)) => Ok(filter),
            _ => Err(self.malformed(position, "all|responses")),
        }
    }

    fn admin_filter(&self, position: usize) -> Result<ResponseFilter, DecodeError> {
        match ResponseFilter::parse(self.raw(position)) {
            Some(filter @ (ResponseFilter::All | ResponseFilter::Unanswered)) => Ok(filter),
            _ => Err(self.malformed(position, "all|unanswered")),
        }
    }
}
