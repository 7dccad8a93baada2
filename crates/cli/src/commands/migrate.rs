use crate::commands::{with_migrated_database, CommandResult};

pub fn run() -> CommandResult {
    let applied = with_migrated_database("migrate", |config, _pool| async move {
        Ok(config.database.url)
    });

    match applied {
        Ok(url) => CommandResult::success("migrate", format!("applied pending migrations to {url}")),
        Err(failure) => failure,
    }
}
