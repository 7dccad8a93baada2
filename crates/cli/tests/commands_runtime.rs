use std::env;
use std::sync::{Mutex, OnceLock};

use reviewdesk_cli::commands::{admin, config, doctor, migrate};
use serde_json::Value;

const TOKEN: &str = "123456:test-secret";

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("REVIEWDESK_BOT_TOKEN", TOKEN), ("REVIEWDESK_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_without_token() {
    with_env(&[], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn grant_rejects_unknown_levels_before_touching_the_database() {
    with_env(&[], || {
        let result = admin::grant(42, 9);
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "admin grant");
        assert_eq!(payload["error_class"], "invalid_level");
    });
}

#[test]
fn ban_reports_users_that_never_talked_to_the_bot() {
    with_env(&[("REVIEWDESK_BOT_TOKEN", TOKEN), ("REVIEWDESK_DATABASE_URL", "sqlite::memory:")], || {
        let result = admin::ban(42, "spam");
        assert_eq!(result.exit_code, 6);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "unknown_user");
    });
}

#[test]
fn grant_then_ban_then_unban_share_one_database_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("reviewdesk.db").display());

    with_env(&[("REVIEWDESK_BOT_TOKEN", TOKEN), ("REVIEWDESK_DATABASE_URL", url.as_str())], || {
        let granted = admin::grant(42, 2);
        assert_eq!(granted.exit_code, 0, "grant output: {}", granted.output);
        let payload = parse_payload(&granted.output);
        assert_eq!(payload["message"], "user 42 now has admin level 2");

        let banned = admin::ban(42, "spam");
        assert_eq!(banned.exit_code, 0, "ban output: {}", banned.output);

        let unbanned = admin::unban(42);
        assert_eq!(unbanned.exit_code, 0, "unban output: {}", unbanned.output);
        assert_eq!(parse_payload(&unbanned.output)["command"], "admin unban");
    });
}

#[test]
fn ban_requires_a_reason() {
    with_env(&[], || {
        let result = admin::ban(42, "   ");
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "invalid_reason");
    });
}

#[test]
fn doctor_passes_with_super_admin_and_reachable_database() {
    with_env(
        &[
            ("REVIEWDESK_BOT_TOKEN", TOKEN),
            ("REVIEWDESK_BOT_SUPER_ADMIN_ID", "900"),
            ("REVIEWDESK_DATABASE_URL", "sqlite::memory:"),
        ],
        || {
            let result = doctor::run(true);
            assert_eq!(result.exit_code, 0, "doctor output: {}", result.output);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["overall_status"], "pass");
            assert_eq!(payload["checks"].as_array().map(Vec::len), Some(3));
        },
    );
}

#[test]
fn doctor_skips_dependent_checks_when_config_fails() {
    with_env(&[], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
        assert_eq!(payload["checks"][2]["status"], "skipped");
    });
}

#[test]
fn doctor_human_output_flags_missing_super_admin() {
    with_env(&[("REVIEWDESK_BOT_TOKEN", TOKEN), ("REVIEWDESK_DATABASE_URL", "sqlite::memory:")], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 1);
        assert!(result.output.contains("- [fail] super_admin"));
        assert!(result.output.contains("- [ok] database_connectivity"));
    });
}

#[test]
fn config_output_redacts_the_bot_secret() {
    with_env(&[("REVIEWDESK_BOT_TOKEN", TOKEN), ("REVIEWDESK_DATABASE_URL", "sqlite::memory:")], || {
        let output = config::run();

        assert!(output.contains("- bot.token = 123456:*** (source: env (REVIEWDESK_BOT_TOKEN))"));
        assert!(output.contains("- feedback.reviews_per_day = 1 (source: default)"));
        assert!(!output.contains("test-secret"));
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let keys = [
        "REVIEWDESK_DATABASE_URL",
        "REVIEWDESK_DATABASE_MAX_CONNECTIONS",
        "REVIEWDESK_DATABASE_TIMEOUT_SECS",
        "REVIEWDESK_BOT_TOKEN",
        "REVIEWDESK_BOT_SUPER_ADMIN_ID",
        "REVIEWDESK_FEEDBACK_REVIEWS_PER_DAY",
        "REVIEWDESK_FEEDBACK_UTC_OFFSET_HOURS",
        "REVIEWDESK_PAGING_MAX_ITEMS_PER_PAGE",
        "REVIEWDESK_PAGING_MAX_CHARS_PER_PAGE",
        "REVIEWDESK_SERVER_BIND_ADDRESS",
        "REVIEWDESK_SERVER_HEALTH_CHECK_PORT",
        "REVIEWDESK_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "REVIEWDESK_LOGGING_LEVEL",
        "REVIEWDESK_LOGGING_FORMAT",
        "REVIEWDESK_LOG_LEVEL",
        "REVIEWDESK_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
