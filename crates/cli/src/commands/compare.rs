use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use tracing::warn;

use pricescout_agent::{ComparisonOutcome, ComparisonRuntime};
use pricescout_core::errors::InterfaceError;
use pricescout_db::HistoryStore;

use crate::commands::{async_runtime, load_config, open_database, CommandResult};

#[derive(Clone, Debug, Default)]
pub struct CompareArgs {
    pub query: String,
    pub scrape_files: Vec<PathBuf>,
    pub no_history: bool,
    /// Print the composed report instead of the JSON envelope.
    pub markdown: bool,
}

pub fn run(args: CompareArgs) -> CommandResult {
    let config = match load_config("compare") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match async_runtime("compare") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let pool = if args.no_history {
            None
        } else {
            match open_database(&config).await {
                Ok(pool) => Some(pool),
                Err((error_class, message, _)) => {
                    warn!(
                        event_name = "history.unavailable",
                        error_class,
                        error = %message,
                        "continuing without search history"
                    );
                    None
                }
            }
        };
        let history = pool.clone().map(|pool| {
            HistoryStore::sql(pool, Duration::from_millis(config.history.write_timeout_ms))
        });

        let comparison = ComparisonRuntime::from_config(&config, &args.scrape_files, history);
        let comparison = match comparison {
            Ok(comparison) => comparison,
            Err(error) => {
                return CommandResult::failure("compare", "pipeline_init", error.to_string(), 6);
            }
        };

        let outcome = comparison.run(&args.query).await;
        if let Some(pool) = pool {
            pool.close().await;
        }

        match outcome {
            Ok(outcome) if args.markdown => CommandResult::plain(outcome.report.markdown),
            Ok(outcome) => CommandResult::success_with_data(
                "compare",
                summary_message(&outcome),
                Some(payload(&outcome)),
            ),
            Err(error) => {
                let interface = error.into_interface("cli");
                let (error_class, exit_code) = match interface {
                    InterfaceError::BadRequest { .. } => ("invalid_query", 7),
                    InterfaceError::ServiceUnavailable { .. } => ("integration", 6),
                    InterfaceError::Internal { .. } => ("internal", 6),
                };
                CommandResult::failure("compare", error_class, interface.user_message(), exit_code)
            }
        }
    })
}

fn summary_message(outcome: &ComparisonOutcome) -> String {
    let result = &outcome.result;
    match result.best() {
        Some(best) => format!(
            "{} listings across {} platforms; best price {} on {}",
            result.listings().len(),
            result.platform_count(),
            best.price,
            best.platform.name()
        ),
        None => format!("no listings with a usable price were found for \"{}\"", result.query()),
    }
}

fn payload(outcome: &ComparisonOutcome) -> serde_json::Value {
    json!({
        "correlation_id": outcome.correlation_id,
        "result": outcome.result,
        "savings_percentage": outcome.result.savings_percentage(),
        "stats": outcome.stats,
        "report": {
            "file_name": outcome.report.file_name,
            "path": outcome.report_path.as_ref().map(|path| path.display().to_string()),
            "narrative_included": outcome.report.narrative_included,
        },
        "history": outcome.history,
    })
}
