use std::io::ErrorKind;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use pricescout_core::report::ReportWriter;
use pricescout_db::{ping, DbPool, HistoryStore};
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    history: HistoryStore,
    reports: ReportWriter,
}

impl HealthState {
    pub fn new(db_pool: DbPool, history: HistoryStore, reports: ReportWriter) -> Self {
        Self { db_pool, history, reports }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

impl HealthCheck {
    fn ready(detail: impl Into<String>) -> Self {
        Self { status: "ready", detail: detail.into() }
    }

    fn degraded(detail: impl Into<String>) -> Self {
        Self { status: "degraded", detail: detail.into() }
    }

    fn is_ready(&self) -> bool {
        self.status == "ready"
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: HealthCheck,
    pub history: HealthCheck,
    pub reports: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// 200 when comparisons can be run and recorded, 503 otherwise.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let history = if database.is_ready() {
        history_check(&state.history).await
    } else {
        HealthCheck::degraded("skipped because the database is unreachable")
    };
    let reports = reports_check(&state.reports).await;
    let ready = database.is_ready() && history.is_ready() && reports.is_ready();

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        history,
        reports,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match ping(pool).await {
        Ok(()) => HealthCheck::ready("database query succeeded"),
        Err(error) => HealthCheck::degraded(format!("database query failed: {error}")),
    }
}

async fn history_check(history: &HistoryStore) -> HealthCheck {
    match history.read_recent(1).await {
        Ok(entries) if entries.is_empty() => HealthCheck::ready("search history is empty"),
        Ok(entries) => HealthCheck::ready(format!(
            "last search recorded at {}",
            entries[0].created_at.to_rfc3339()
        )),
        Err(error) => HealthCheck::degraded(format!("search history unreadable: {error}")),
    }
}

// A missing directory is fine: the writer creates it with the first report.
async fn reports_check(reports: &ReportWriter) -> HealthCheck {
    let directory = reports.directory();
    match tokio::fs::metadata(directory).await {
        Ok(metadata) if metadata.is_dir() => {
            HealthCheck::ready(format!("reports are written to `{}`", directory.display()))
        }
        Ok(_) => HealthCheck::degraded(format!("`{}` is not a directory", directory.display())),
        Err(error) if error.kind() == ErrorKind::NotFound => HealthCheck::ready(format!(
            "`{}` will be created with the first report",
            directory.display()
        )),
        Err(error) => {
            HealthCheck::degraded(format!("cannot inspect `{}`: {error}", directory.display()))
        }
    }
}
