pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "carsellmax",
    about = "CarSellMax operator CLI",
    long_about = "Apply migrations, inspect configuration, check readiness and report offer metrics.",
    after_help = "Examples:\n  carsellmax doctor --json\n  carsellmax metrics --days 7\n  carsellmax alerts"
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
    #[command(about = "Validate config, mail readiness, DB connectivity and schema presence")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Compute SLA, acceptance and discount metrics over a trailing window")]
    Metrics {
        #[arg(long, help = "Window size in days (1..=365, default 30)")]
        days: Option<u32>,
    },
    #[command(about = "Evaluate operational alert rules against all submissions")]
    Alerts,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Metrics { days } => commands::metrics::run(days),
        Command::Alerts => commands::alerts::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
