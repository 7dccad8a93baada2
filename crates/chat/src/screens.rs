//! Screen constructors for every stage of the dialogue.

use chrono::{DateTime, FixedOffset, Utc};

use reviewdesk_core::domain::feedback::{
    FeedbackItem, ItemKind, Rating, ReplyTarget, ResponseFilter, SortOrder,
};
use reviewdesk_core::domain::user::{AdminLevel, FeedbackUser};
use reviewdesk_core::flows::{BrowseKey, BrowseScope};
use reviewdesk_core::navigation::{ActionToken, PageView};

use crate::keyboard::{Screen, ScreenBuilder};

const DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

pub fn greeting(hour: u32) -> &'static str {
    match hour {
        0..=5 => "Good night",
        6..=11 => "Good morning",
        12..=17 => "Good afternoon",
        _ => "Good evening",
    }
}

/// What a user sees after `/start` or when returning to the root.
pub fn root(user: &FeedbackUser, local_hour: u32) -> Screen {
    if user.admin_level.is_admin() {
        return admin_menu("Admin panel. What would you like to review?");
    }

    main_menu(format!(
        "{}, {}! We would love to hear what you think.",
        greeting(local_hour),
        user.display_name()
    ))
}

pub fn main_menu(text: impl Into<String>) -> Screen {
    ScreenBuilder::new(text)
        .button("Leave a review", ActionToken::LeaveReview)
        .button("Ask a question", ActionToken::Ask)
        .button("My history", ActionToken::HistoryRoot)
        .build()
}

pub fn admin_menu(text: impl Into<String>) -> Screen {
    ScreenBuilder::new(text)
        .button("Reviews", ActionToken::AdminHistory(ItemKind::Review))
        .button("Questions", ActionToken::AdminHistory(ItemKind::Question))
        .build()
}

/// Terminal screens end on the menu matching the user's role.
pub fn home(level: AdminLevel, text: impl Into<String>) -> Screen {
    if level.is_admin() {
        admin_menu(text)
    } else {
        main_menu(text)
    }
}

pub fn rating_keyboard() -> Screen {
    ScreenBuilder::new("How would you rate us?")
        .row(|row| {
            for rating in Rating::all() {
                row.button(rating.stars().to_string(), ActionToken::Rate(rating));
            }
        })
        .button("Back", ActionToken::BackToRoot)
        .build()
}

pub fn review_text_prompt(rating: Rating) -> Screen {
    ScreenBuilder::new(format!("You rated us {}/{}.", rating.stars(), Rating::MAX))
        .paragraph("Tell us a bit more, or skip to send just the rating.")
        .button("Skip", ActionToken::SkipText)
        .button("Cancel", ActionToken::BackToRoot)
        .build()
}

pub fn review_saved(level: AdminLevel) -> Screen {
    home(level, "Thank you for your review!")
}

pub fn question_prompt() -> Screen {
    ScreenBuilder::new("Type your question and send it as a message.")
        .button("Back", ActionToken::BackToRoot)
        .build()
}

pub fn question_saved(level: AdminLevel) -> Screen {
    home(level, "Your question has been sent. We will answer soon.")
}

pub fn history_types() -> Screen {
    ScreenBuilder::new("What would you like to see?")
        .button("My reviews", ActionToken::HistoryType(ItemKind::Review))
        .button("My questions", ActionToken::HistoryType(ItemKind::Question))
        .button("Back", ActionToken::BackToRoot)
        .build()
}

/// The "with responses" option only appears once something was answered.
pub fn own_filters(kind: ItemKind, has_answered: bool) -> Screen {
    ScreenBuilder::new(format!("Which {} should I show?", kind.as_str()))
        .button("All", ActionToken::Filter { filter: ResponseFilter::All, kind })
        .row(|row| {
            row.button_if(
                has_answered,
                "Only with responses",
                ActionToken::Filter { filter: ResponseFilter::Answered, kind },
            );
        })
        .button("Back", ActionToken::HistoryRoot)
        .build()
}

pub fn admin_filters(kind: ItemKind) -> Screen {
    ScreenBuilder::new(format!("Which {} should I show?", kind.as_str()))
        .button("All", ActionToken::AdminFilter { filter: ResponseFilter::All, kind })
        .button("Unanswered", ActionToken::AdminFilter { filter: ResponseFilter::Unanswered, kind })
        .button("Back", ActionToken::BackToRoot)
        .build()
}

pub fn sort_keyboard(scope: BrowseScope, kind: ItemKind, filter: ResponseFilter) -> Screen {
    let sort_token = |sort| match scope {
        BrowseScope::Own => ActionToken::Sort { sort, kind, filter },
        BrowseScope::All => ActionToken::AdminSort { sort, kind, filter },
    };

    ScreenBuilder::new("How should they be sorted?")
        .button("Newest first", sort_token(SortOrder::Newest))
        .button("Oldest first", sort_token(SortOrder::Oldest))
        .button("Back", back_to_filter(scope, kind))
        .build()
}

pub fn empty_list(key: BrowseKey) -> Screen {
    ScreenBuilder::new(format!("There are no {} here yet.", key.kind.as_str()))
        .button("Back", back_to_filter(key.scope, key.kind))
        .button("Main menu", ActionToken::BackToRoot)
        .build()
}

/// One page of a browse session. `reply` adds the administrator's reply
/// button for the item shown on a detail page.
pub fn list_page(key: BrowseKey, view: &PageView<'_>, reply: Option<ReplyTarget>) -> Screen {
    let page_token = |index: usize| {
        let index = u32::try_from(index).unwrap_or(u32::MAX);
        match key.scope {
            BrowseScope::Own => {
                ActionToken::Page { index, kind: key.kind, filter: key.filter, sort: key.sort }
            }
            BrowseScope::All => {
                ActionToken::AdminPage { index, kind: key.kind, filter: key.filter, sort: key.sort }
            }
        }
    };

    ScreenBuilder::new(view.items.join("\n\n"))
        .row(|row| {
            row.button_if(view.has_previous(), "«", page_token(view.index.saturating_sub(1)))
                .button(format!("{}/{}", view.number, view.total), ActionToken::Noop)
                .button_if(view.has_next(), "»", page_token(view.index + 1));
        })
        .row(|row| {
            if let Some(target) = reply {
                row.button("Reply", ActionToken::AdminReply { id: target.id, kind: target.kind });
            }
        })
        .button("Back", back_to_filter(key.scope, key.kind))
        .button("Main menu", ActionToken::BackToRoot)
        .build()
}

pub fn reply_prompt(item: &FeedbackItem, offset: FixedOffset) -> Screen {
    ScreenBuilder::new(detail_entry(item, offset))
        .paragraph("Enter your reply")
        .button("Cancel", ActionToken::AdminCancelReply)
        .build()
}

pub fn reply_saved(level: AdminLevel) -> Screen {
    home(level, "Your reply has been saved.")
}

pub fn reply_cancelled(level: AdminLevel) -> Screen {
    home(level, "Reply cancelled.")
}

pub fn already_answered(level: AdminLevel) -> Screen {
    home(level, "Another administrator answered this one first. Your reply was not saved.")
}

pub fn session_expired(level: AdminLevel) -> Screen {
    home(level, "Your session has expired. Please start again.")
}

pub fn banned(reason: Option<&str>) -> Screen {
    let text = match reason {
        Some(reason) => format!("You are banned. Reason: {reason}"),
        None => "You are banned.".to_owned(),
    };
    main_menu(text)
}

pub fn daily_limit() -> Screen {
    ScreenBuilder::new("You have already left a review today. Come back tomorrow!")
        .button("Back", ActionToken::BackToRoot)
        .build()
}

/// Sent to every administrator when a new review or question arrives.
pub fn notice(item: &FeedbackItem, offset: FixedOffset) -> Screen {
    let heading = match item.kind() {
        ItemKind::Review => "New review",
        ItemKind::Question => "New question",
    };
    ScreenBuilder::new(heading)
        .paragraph(detail_entry(item, offset))
        .button("OK", ActionToken::Dismiss)
        .build()
}

pub fn insufficient_rights() -> &'static str {
    "You don't have permission to do that."
}

pub fn reply_target_missing() -> &'static str {
    "This item no longer exists."
}

pub fn reply_target_answered() -> &'static str {
    "This item has already been answered."
}

/// Compact entry for a user's own history.
pub fn list_entry(item: &FeedbackItem, offset: FixedOffset) -> String {
    let mut entry = format!("{} {}", marker(item), format_date(item.created_at(), offset));
    if let Some(body) = body(item) {
        entry.push('\n');
        entry.push_str(body);
    }
    if let Some(response) = item.admin_response() {
        entry.push_str("\nResponse: ");
        entry.push_str(response);
    }
    entry
}

/// Full entry for administrators: author, status and response.
pub fn detail_entry(item: &FeedbackItem, offset: FixedOffset) -> String {
    let author = match item.username() {
        Some(username) => format!("@{username} (id {})", item.author()),
        None => format!("id {}", item.author()),
    };
    let status = if item.is_answered() { "answered" } else { "awaiting response" };

    let mut entry = format!(
        "#{} {} {}\nFrom: {author}\nStatus: {status}",
        item.id(),
        marker(item),
        format_date(item.created_at(), offset)
    );
    if let Some(body) = body(item) {
        entry.push('\n');
        entry.push_str(body);
    }
    if let Some(response) = item.admin_response() {
        entry.push_str("\nResponse: ");
        entry.push_str(response);
    }
    entry
}

fn marker(item: &FeedbackItem) -> String {
    match item {
        FeedbackItem::Review(review) => "★".repeat(usize::from(review.rating.stars())),
        FeedbackItem::Question(_) => "?".to_owned(),
    }
}

fn body(item: &FeedbackItem) -> Option<&str> {
    match item {
        FeedbackItem::Review(review) => review.text.as_deref(),
        FeedbackItem::Question(question) => Some(question.text.as_str()),
    }
}

fn format_date(value: DateTime<Utc>, offset: FixedOffset) -> String {
    value.with_timezone(&offset).format(DATE_FORMAT).to_string()
}

fn back_to_filter(scope: BrowseScope, kind: ItemKind) -> ActionToken {
    match scope {
        BrowseScope::Own => ActionToken::BackToFilter(kind),
        BrowseScope::All => ActionToken::AdminHistory(kind),
    }
}
