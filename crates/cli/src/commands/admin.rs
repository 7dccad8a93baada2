use reviewdesk_core::{AdminLevel, UserId};
use reviewdesk_db::{FeedbackRepository, SqlFeedbackRepository};

use crate::commands::{with_migrated_database, CommandResult, StepFailure};

pub fn grant(user_id: i64, level: u8) -> CommandResult {
    let level = match AdminLevel::new(level) {
        Ok(level) => level,
        Err(error) => return CommandResult::failure("admin grant", "invalid_level", error.to_string(), 2),
    };

    let granted = with_migrated_database("admin grant", |_config, pool| async move {
        SqlFeedbackRepository::new(pool)
            .set_admin_level(UserId(user_id), level)
            .await
            .map_err(|error| StepFailure::new("store_write", error.to_string(), 7))
    });

    match granted {
        Ok(()) => CommandResult::success(
            "admin grant",
            format!("user {user_id} now has admin level {}", level.value()),
        ),
        Err(failure) => failure,
    }
}

pub fn ban(user_id: i64, reason: &str) -> CommandResult {
    let reason = reason.trim().to_string();
    if reason.is_empty() {
        return CommandResult::failure("admin ban", "invalid_reason", "ban reason must not be empty", 2);
    }

    let banned = with_migrated_database("admin ban", |_config, pool| async move {
        SqlFeedbackRepository::new(pool)
            .ban_user(UserId(user_id), &reason)
            .await
            .map_err(|error| StepFailure::new("store_write", error.to_string(), 7))
    });

    match banned {
        Ok(true) => CommandResult::success("admin ban", format!("user {user_id} is banned")),
        Ok(false) => unknown_user("admin ban", user_id),
        Err(failure) => failure,
    }
}

pub fn unban(user_id: i64) -> CommandResult {
    let unbanned = with_migrated_database("admin unban", |_config, pool| async move {
        SqlFeedbackRepository::new(pool)
            .unban_user(UserId(user_id))
            .await
            .map_err(|error| StepFailure::new("store_write", error.to_string(), 7))
    });

    match unbanned {
        Ok(true) => CommandResult::success("admin unban", format!("user {user_id} is no longer banned")),
        Ok(false) => unknown_user("admin unban", user_id),
        Err(failure) => failure,
    }
}

fn unknown_user(command: &str, user_id: i64) -> CommandResult {
    CommandResult::failure(
        command,
        "unknown_user",
        format!("user {user_id} has never talked to the bot"),
        6,
    )
}
