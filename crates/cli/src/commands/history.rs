use std::time::Duration;

use serde::Serialize;

use pricescout_core::domain::history::HistoryEntry;
use pricescout_db::HistoryStore;

use crate::commands::{async_runtime, load_config, open_database, CommandResult};

#[derive(Debug, Serialize)]
struct HistoryRow {
    id: String,
    query: String,
    created_at: String,
    status: &'static str,
    best_platform: Option<String>,
    best_price: Option<String>,
    platform_count: usize,
}

impl From<&HistoryEntry> for HistoryRow {
    fn from(entry: &HistoryEntry) -> Self {
        let best = entry.result.best();
        Self {
            id: entry.id.0.clone(),
            query: entry.query.clone(),
            created_at: entry.created_at.to_rfc3339(),
            status: entry.result.status().as_str(),
            best_platform: best.map(|listing| listing.platform.name().to_string()),
            best_price: best.map(|listing| listing.price.to_string()),
            platform_count: entry.result.platform_count(),
        }
    }
}

pub fn run(limit: Option<u32>) -> CommandResult {
    let config = match load_config("history") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match async_runtime("history") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    let limit = limit.unwrap_or(config.history.recent_limit);

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let store =
            HistoryStore::sql(pool.clone(), Duration::from_millis(config.history.write_timeout_ms));
        let entries = store
            .read_recent(limit)
            .await
            .map_err(|error| ("history_read", error.to_string(), 6u8));
        pool.close().await;
        entries
    });

    match result {
        Ok(entries) => {
            let rows: Vec<HistoryRow> = entries.iter().map(HistoryRow::from).collect();
            CommandResult::success_with_data(
                "history",
                format!("{} recent searches", rows.len()),
                serde_json::to_value(&rows).ok(),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("history", error_class, message, exit_code)
        }
    }
}
