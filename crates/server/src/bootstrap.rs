use std::sync::Arc;

use reviewdesk_chat::{
    navigation_dispatcher, runner::NoopChatTransport, runner::NoopUpdateSource, BotRunner,
    NavigationController, NavigationSettings, ReconnectPolicy,
};
use reviewdesk_core::config::{AppConfig, ConfigError};
use reviewdesk_core::AdminLevel;
use reviewdesk_db::{
    connect_with_settings, migrations, DbPool, FeedbackRepository, RepositoryError,
    SqlFeedbackRepository,
};
use thiserror::Error;
use tracing::info;

pub type Controller = NavigationController<SqlFeedbackRepository>;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub controller: Arc<Controller>,
    pub runner: BotRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("could not promote the configured super admin: {0}")]
    SuperAdmin(#[source] RepositoryError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let repository = Arc::new(SqlFeedbackRepository::new(db_pool.clone()));
    if let Some(super_admin) = config.bot.super_admin() {
        repository
            .set_admin_level(super_admin, AdminLevel::SUPER_ADMIN)
            .await
            .map_err(BootstrapError::SuperAdmin)?;
        info!(
            event_name = "system.bootstrap.super_admin_promoted",
            correlation_id = "bootstrap",
            user_id = super_admin.0,
            "configured super admin promoted"
        );
    }

    let controller =
        Arc::new(NavigationController::new(repository, NavigationSettings::from_config(&config)));
    // No network transport ships in this workspace; deployments plug one in here.
    let runner = BotRunner::new(
        Arc::new(NoopUpdateSource),
        Arc::new(NoopChatTransport),
        navigation_dispatcher(Arc::clone(&controller)),
        ReconnectPolicy::default(),
    )
    .with_session_registry(controller.sessions());

    Ok(Application { config, db_pool, controller, runner })
}

#[cfg(test)]
mod tests {
    use reviewdesk_chat::{ChatUser, Reply};
    use reviewdesk_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use reviewdesk_core::{AdminLevel, UserId};
    use reviewdesk_db::FeedbackRepository;

    use crate::bootstrap::{bootstrap_with_config, Application, BootstrapError};

    const TOKEN: &str = "123456:test-secret";

    #[tokio::test]
    async fn bootstrap_fails_fast_with_malformed_bot_token() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                bot_token: Some("not-a-token".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("bootstrap should fail").to_string();
        assert!(message.contains("bot.token"));
    }

    #[tokio::test]
    async fn bootstrap_migrates_promotes_super_admin_and_serves_the_root_menu() {
        let app = bootstrap(valid_options(Some(900))).await.expect("bootstrap should succeed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('feedback_user', 'review', 'question')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query");
        assert_eq!(table_count, 3, "bootstrap should apply the feedback schema");

        let repository = reviewdesk_db::SqlFeedbackRepository::new(app.db_pool.clone());
        let admin = repository.find_user(UserId(900)).await.expect("lookup").expect("admin row");
        assert_eq!(admin.admin_level, AdminLevel::SUPER_ADMIN);

        let outcome = app
            .controller
            .handle_start(&ChatUser::new(900, Some("owner")))
            .await
            .expect("start should render");
        let Reply::Render(screen) = outcome.reply else {
            panic!("expected a rendered screen");
        };
        assert!(!screen.rows.is_empty());

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_without_super_admin_leaves_the_user_table_empty() {
        let app = bootstrap(valid_options(None)).await.expect("bootstrap should succeed");

        let repository = reviewdesk_db::SqlFeedbackRepository::new(app.db_pool.clone());
        assert!(repository.list_admins().await.expect("admins").is_empty());

        app.db_pool.close().await;
    }

    async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
        bootstrap_with_config(AppConfig::load(options)?).await
    }

    fn valid_options(super_admin_id: Option<i64>) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                bot_token: Some(TOKEN.to_string()),
                super_admin_id,
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }
}
