pub mod commands;

use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "leaveflow",
    about = "Leaveflow operator CLI",
    long_about = "Operate the leave-approval runtime: migrations, demo data, escalation sweeps, config inspection and readiness checks.",
    after_help = "Examples:\n  leaveflow migrate\n  leaveflow seed --year 2027\n  leaveflow sweep\n  leaveflow doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo organisation, leave balances and a blackout period")]
    Seed {
        #[arg(long, help = "Leave year to grant balances for (defaults to the current year)")]
        year: Option<i32>,
    },
    #[command(about = "Run the document-deadline and stale-approval sweeps once")]
    Sweep,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, database connectivity and schema readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed { year } => commands::seed::run(year.unwrap_or_else(|| Utc::now().year())),
        Command::Sweep => commands::sweep::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
