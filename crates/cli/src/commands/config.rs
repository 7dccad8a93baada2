use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use reviewdesk_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

/// One reported setting: dotted key, its env override and the rendered value.
struct Field {
    key: &'static str,
    env_key: &'static str,
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let file_path = detect_config_path();
    let file_doc = file_path.as_deref().and_then(load_config_file_doc);

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(&field, file_doc.as_ref(), file_path.as_deref());
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let field = |key: &'static str, env_key: &'static str, value: String| Field { key, env_key, value };

    vec![
        field("database.url", "REVIEWDESK_DATABASE_URL", config.database.url.clone()),
        field(
            "database.max_connections",
            "REVIEWDESK_DATABASE_MAX_CONNECTIONS",
            config.database.max_connections.to_string(),
        ),
        field(
            "database.timeout_secs",
            "REVIEWDESK_DATABASE_TIMEOUT_SECS",
            config.database.timeout_secs.to_string(),
        ),
        field("bot.token", "REVIEWDESK_BOT_TOKEN", redact_token(config.bot.token.expose_secret())),
        field(
            "bot.super_admin_id",
            "REVIEWDESK_BOT_SUPER_ADMIN_ID",
            config.bot.super_admin_id.map_or_else(|| "<unset>".to_string(), |id| id.to_string()),
        ),
        field(
            "feedback.reviews_per_day",
            "REVIEWDESK_FEEDBACK_REVIEWS_PER_DAY",
            config.feedback.reviews_per_day.to_string(),
        ),
        field(
            "feedback.utc_offset_hours",
            "REVIEWDESK_FEEDBACK_UTC_OFFSET_HOURS",
            config.feedback.utc_offset_hours.to_string(),
        ),
        field(
            "paging.max_items_per_page",
            "REVIEWDESK_PAGING_MAX_ITEMS_PER_PAGE",
            config.paging.max_items_per_page.to_string(),
        ),
        field(
            "paging.max_chars_per_page",
            "REVIEWDESK_PAGING_MAX_CHARS_PER_PAGE",
            config.paging.max_chars_per_page.to_string(),
        ),
        field("server.bind_address", "REVIEWDESK_SERVER_BIND_ADDRESS", config.server.bind_address.clone()),
        field(
            "server.health_check_port",
            "REVIEWDESK_SERVER_HEALTH_CHECK_PORT",
            config.server.health_check_port.to_string(),
        ),
        field(
            "server.graceful_shutdown_secs",
            "REVIEWDESK_SERVER_GRACEFUL_SHUTDOWN_SECS",
            config.server.graceful_shutdown_secs.to_string(),
        ),
        field("logging.level", "REVIEWDESK_LOGGING_LEVEL", config.logging.level.clone()),
        field("logging.format", "REVIEWDESK_LOGGING_FORMAT", format!("{:?}", config.logging.format)),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["reviewdesk.toml", "config/reviewdesk.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    toml::from_str::<Value>(&fs::read_to_string(path).ok()?).ok()
}

fn field_source(field: &Field, file_doc: Option<&Value>, file_path: Option<&Path>) -> String {
    if env::var_os(field.env_key).is_some() {
        return format!("env ({})", field.env_key);
    }

    if file_doc.is_some_and(|doc| contains_path(doc, field.key)) {
        let file_path = file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    key_path.split('.').try_fold(root, |current, key| current.get(key)).is_some()
}

/// Keeps the public bot id and hides the secret half.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once(':') {
        Some((bot_id, _)) => format!("{bot_id}:***"),
        None => "<redacted>".to_string(),
    }
}
