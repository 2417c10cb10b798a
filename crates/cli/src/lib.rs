pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pricescout_core::config::{AppConfig, LoadOptions, LogFormat};
use tracing_subscriber::EnvFilter;

use crate::commands::compare::CompareArgs;

#[derive(Debug, Parser)]
#[command(
    name = "pricescout",
    about = "Pricescout price comparison CLI",
    long_about = "Compare product prices across Pakistani marketplaces, inspect search history, \
                  and check runtime readiness.",
    after_help = "Examples:
  pricescout compare \"iphone 15\"
  pricescout compare \"iphone 15\" --scrape-file daraz.json --markdown
  pricescout history --limit 5
  pricescout doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Compare prices for a product and write a markdown report")]
    Compare {
        #[arg(help = "Product to search for, e.g. \"iphone 15 128gb\"")]
        query: String,
        #[arg(
            long = "scrape-file",
            value_name = "PATH",
            help = "JSON scrape payload to include (repeatable)"
        )]
        scrape_files: Vec<PathBuf>,
        #[arg(long, help = "Do not record this search in history")]
        no_history: bool,
        #[arg(long, help = "Print the markdown report instead of the JSON summary")]
        markdown: bool,
    },
    #[command(about = "List recent searches, newest first")]
    History {
        #[arg(long, help = "Number of entries to return (defaults to history.recent_limit)")]
        limit: Option<u32>,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, credentials, reports directory and database readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Compare { query, scrape_files, no_history, markdown } => {
            commands::compare::run(CompareArgs { query, scrape_files, no_history, markdown })
        }
        Command::History { limit } => commands::history::run(limit),
        Command::Migrate => commands::migrate::run(),
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

/// Logs go to stderr so stdout stays machine readable. Falls back to `warn`
/// when configuration does not load; the command reports that failure itself.
fn init_logging() {
    let (level, format) = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => (config.logging.level, config.logging.format),
        Err(_) => ("warn".to_string(), LogFormat::Compact),
    };
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);

    let _ = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
