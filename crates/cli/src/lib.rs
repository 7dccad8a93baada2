pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "reviewdesk",
    about = "Reviewdesk operator CLI",
    long_about = "Apply migrations, inspect configuration, check readiness and manage bot users.",
    after_help = "Examples:\n  reviewdesk doctor --json\n  reviewdesk admin grant 4242 3\n  reviewdesk admin ban 4242 --reason spam"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, bot token readiness and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(subcommand, about = "Manage admin levels and bans")]
    Admin(AdminCommand),
}

#[derive(Debug, Subcommand)]
enum AdminCommand {
    #[command(about = "Set a user's admin level (0 = regular user, 4 = super admin)")]
    Grant { user_id: i64, level: u8 },
    #[command(about = "Ban a user from leaving feedback")]
    Ban {
        user_id: i64,
        #[arg(long, default_value = "no reason given")]
        reason: String,
    },
    #[command(about = "Lift a ban")]
    Unban { user_id: i64 },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Admin(AdminCommand::Grant { user_id, level }) => {
            commands::admin::grant(user_id, level)
        }
        Command::Admin(AdminCommand::Ban { user_id, reason }) => {
            commands::admin::ban(user_id, &reason)
        }
        Command::Admin(AdminCommand::Unban { user_id }) => commands::admin::unban(user_id),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
