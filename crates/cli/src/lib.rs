pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "paybot",
    about = "Paybot operator CLI",
    long_about = "Inspect configuration, check Slack and SMTP readiness, and export the payment log.",
    after_help = "Examples:\n  paybot doctor --json\n  paybot config\n  paybot mail-check\n  paybot export --output payments.xlsx"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Slack authentication, mail settings and the record log")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Log in to the configured SMTP server without sending anything")]
    MailCheck,
    #[command(about = "Convert the whole payment log into an Excel workbook")]
    Export {
        #[arg(long, short, help = "Where to write the .xlsx file")]
        output: PathBuf,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::MailCheck => commands::mail_check::run(),
        Command::Export { output } => commands::export::run(&output),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
