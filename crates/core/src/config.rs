use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Offset, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::user::UserId;
use crate::navigation::PageLimits;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub bot: BotConfig,
    pub feedback: FeedbackConfig,
    pub paging: PagingConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub token: SecretString,
    /// Promoted to the top admin level on every start.
    pub super_admin_id: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct FeedbackConfig {
    /// Reviews a user may leave per local calendar day. Zero disables the limit.
    pub reviews_per_day: u32,
    pub utc_offset_hours: i32,
}

#[derive(Clone, Debug)]
pub struct PagingConfig {
    pub max_items_per_page: usize,
    pub max_chars_per_page: usize,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub bot_token: Option<String>,
    pub super_admin_id: Option<i64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://reviewdesk.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            bot: BotConfig { token: String::new().into(), super_admin_id: None },
            feedback: FeedbackConfig { reviews_per_day: 1, utc_offset_hours: 5 },
            paging: PagingConfig {
                max_items_per_page: PageLimits::LIST.max_items,
                max_chars_per_page: PageLimits::LIST.max_chars,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl BotConfig {
    pub fn super_admin(&self) -> Option<UserId> {
        self.super_admin_id.map(UserId)
    }
}

impl FeedbackConfig {
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }
}

impl PagingConfig {
    pub fn list_limits(&self) -> PageLimits {
        PageLimits::new(self.max_items_per_page, self.max_chars_per_page)
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("reviewdesk.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(bot) = patch.bot {
            if let Some(token) = bot.token {
                self.bot.token = secret_value(token);
            }
            if let Some(super_admin_id) = bot.super_admin_id {
                self.bot.super_admin_id = Some(super_admin_id);
            }
        }

        if let Some(feedback) = patch.feedback {
            if let Some(reviews_per_day) = feedback.reviews_per_day {
                self.feedback.reviews_per_day = reviews_per_day;
            }
            if let Some(utc_offset_hours) = feedback.utc_offset_hours {
                self.feedback.utc_offset_hours = utc_offset_hours;
            }
        }

        if let Some(paging) = patch.paging {
            if let Some(max_items) = paging.max_items_per_page {
                self.paging.max_items_per_page = max_items;
            }
            if let Some(max_chars) = paging.max_chars_per_page {
                self.paging.max_chars_per_page = max_chars;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("REVIEWDESK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("REVIEWDESK_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("REVIEWDESK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("REVIEWDESK_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("REVIEWDESK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("REVIEWDESK_BOT_TOKEN") {
            self.bot.token = secret_value(value);
        }
        if let Some(value) = read_env("REVIEWDESK_BOT_SUPER_ADMIN_ID") {
            self.bot.super_admin_id = Some(parse_env("REVIEWDESK_BOT_SUPER_ADMIN_ID", &value)?);
        }

        if let Some(value) = read_env("REVIEWDESK_FEEDBACK_REVIEWS_PER_DAY") {
            self.feedback.reviews_per_day =
                parse_env("REVIEWDESK_FEEDBACK_REVIEWS_PER_DAY", &value)?;
        }
        if let Some(value) = read_env("REVIEWDESK_FEEDBACK_UTC_OFFSET_HOURS") {
            self.feedback.utc_offset_hours =
                parse_env("REVIEWDESK_FEEDBACK_UTC_OFFSET_HOURS", &value)?;
        }

        if let Some(value) = read_env("REVIEWDESK_PAGING_MAX_ITEMS_PER_PAGE") {
            self.paging.max_items_per_page =
                parse_env("REVIEWDESK_PAGING_MAX_ITEMS_PER_PAGE", &value)?;
        }
        if let Some(value) = read_env("REVIEWDESK_PAGING_MAX_CHARS_PER_PAGE") {
            self.paging.max_chars_per_page =
                parse_env("REVIEWDESK_PAGING_MAX_CHARS_PER_PAGE", &value)?;
        }

        if let Some(value) = read_env("REVIEWDESK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("REVIEWDESK_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_env("REVIEWDESK_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("REVIEWDESK_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("REVIEWDESK_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("REVIEWDESK_LOGGING_LEVEL").or_else(|| read_env("REVIEWDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("REVIEWDESK_LOGGING_FORMAT").or_else(|| read_env("REVIEWDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.bot_token {
            self.bot.token = secret_value(bot_token);
        }
        if let Some(super_admin_id) = overrides.super_admin_id {
            self.bot.super_admin_id = Some(super_admin_id);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_bot(&self.bot)?;
        validate_feedback(&self.feedback)?;
        validate_paging(&self.paging)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("reviewdesk.toml"), PathBuf::from("config/reviewdesk.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_bot(bot: &BotConfig) -> Result<(), ConfigError> {
    let token = bot.token.expose_secret();
    if token.is_empty() {
        return Err(ConfigError::Validation(
            "bot.token is required. Ask the platform's bot registry for a token and set REVIEWDESK_BOT_TOKEN"
                .to_string(),
        ));
    }

    let well_formed = token
        .split_once(':')
        .map(|(id, secret)| {
            !id.is_empty() && id.bytes().all(|byte| byte.is_ascii_digit()) && !secret.is_empty()
        })
        .unwrap_or(false);
    if !well_formed {
        return Err(ConfigError::Validation(
            "bot.token must look like `<numeric bot id>:<secret>`".to_string(),
        ));
    }

    if matches!(bot.super_admin_id, Some(id) if id <= 0) {
        return Err(ConfigError::Validation(
            "bot.super_admin_id must be a positive user id".to_string(),
        ));
    }

    Ok(())
}

fn validate_feedback(feedback: &FeedbackConfig) -> Result<(), ConfigError> {
    if !(-12..=14).contains(&feedback.utc_offset_hours) {
        return Err(ConfigError::Validation(
            "feedback.utc_offset_hours must be in range -12..=14".to_string(),
        ));
    }

    Ok(())
}

fn validate_paging(paging: &PagingConfig) -> Result<(), ConfigError> {
    if paging.max_items_per_page == 0 {
        return Err(ConfigError::Validation(
            "paging.max_items_per_page must be greater than zero".to_string(),
        ));
    }

    if paging.max_chars_per_page == 0 {
        return Err(ConfigError::Validation(
            "paging.max_chars_per_page must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    bot: Option<BotPatch>,
    feedback: Option<FeedbackPatch>,
    paging: Option<PagingPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct BotPatch {
    token: Option<String>,
    super_admin_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct FeedbackPatch {
    reviews_per_day: Option<u32>,
    utc_offset_hours: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct PagingPatch {
    max_items_per_page: Option<usize>,
    max_chars_per_page: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
