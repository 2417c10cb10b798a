//! JSON API consumed by the comparison UI.
//!
//! - `POST /api/compare`        run a comparison for `{ "query": "..." }`
//! - `GET  /api/history?limit=` recent searches, newest first
//! - `GET  /reports/{file}`     download a previously written markdown report

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use pricescout_agent::{ComparisonOutcome, ComparisonRuntime};
use pricescout_core::domain::history::HistoryEntry;
use pricescout_core::domain::result::ReconciledResult;
use pricescout_core::errors::InterfaceError;
use pricescout_core::normalize::NormalizationStats;
use pricescout_core::report::ReportWriter;
use pricescout_db::{AppendOutcome, HistoryStore};

const MAX_HISTORY_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct ApiState {
    comparison: Arc<ComparisonRuntime>,
    history: HistoryStore,
    reports: ReportWriter,
    recent_limit: u32,
    // One comparison runs end to end at a time.
    run_gate: Arc<Mutex<()>>,
}

impl ApiState {
    pub fn new(
        comparison: Arc<ComparisonRuntime>,
        history: HistoryStore,
        reports: ReportWriter,
        recent_limit: u32,
    ) -> Self {
        Self { comparison, history, reports, recent_limit, run_gate: Arc::new(Mutex::new(())) }
    }
}

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct ReportSummary {
    pub file_name: String,
    pub download_url: Option<String>,
    pub narrative_included: bool,
    pub markdown: String,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub correlation_id: String,
    pub result: ReconciledResult,
    pub savings_percentage: Decimal,
    pub stats: NormalizationStats,
    pub report: ReportSummary,
    pub history: Option<AppendOutcome>,
}

impl From<ComparisonOutcome> for CompareResponse {
    fn from(outcome: ComparisonOutcome) -> Self {
        let download_url =
            outcome.report_path.as_ref().map(|_| format!("/reports/{}", outcome.report.file_name));
        Self {
            correlation_id: outcome.correlation_id,
            savings_percentage: outcome.result.savings_percentage(),
            result: outcome.result,
            stats: outcome.stats,
            report: ReportSummary {
                file_name: outcome.report.file_name,
                download_url,
                narrative_included: outcome.report.narrative_included,
                markdown: outcome.report.markdown,
            },
            history: outcome.history,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct HistoryItem {
    pub id: String,
    pub query: String,
    pub created_at: String,
    pub status: &'static str,
    pub best_platform: Option<String>,
    pub best_price: Option<Decimal>,
    pub platform_count: usize,
    pub listing_count: usize,
}

impl From<HistoryEntry> for HistoryItem {
    fn from(entry: HistoryEntry) -> Self {
        let best = entry.result.best();
        Self {
            id: entry.id.0.clone(),
            created_at: entry.created_at.to_rfc3339(),
            status: entry.result.status().as_str(),
            best_platform: best.map(|listing| listing.platform.name().to_string()),
            best_price: best.map(|listing| listing.price),
            platform_count: entry.result.platform_count(),
            listing_count: entry.result.listings().len(),
            query: entry.query,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub correlation_id: String,
}

type ApiFailure = (StatusCode, Json<ApiError>);

fn failure(
    status: StatusCode,
    error: impl Into<String>,
    correlation_id: impl Into<String>,
) -> ApiFailure {
    (status, Json(ApiError { error: error.into(), correlation_id: correlation_id.into() }))
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/compare", post(compare))
        .route("/api/history", get(recent_history))
        .route("/reports/{file}", get(download_report))
        .with_state(state)
}

pub async fn compare(
    State(state): State<ApiState>,
    Json(request): Json<CompareRequest>,
) -> Result<Json<CompareResponse>, ApiFailure> {
    let _running = state.run_gate.lock().await;

    match state.comparison.run(&request.query).await {
        Ok(outcome) => Ok(Json(CompareResponse::from(outcome))),
        Err(error) => {
            let correlation_id = Uuid::new_v4().to_string();
            warn!(
                event_name = "api.compare.failed",
                correlation_id = %correlation_id,
                error = %error,
                "comparison request failed"
            );
            let interface = error.into_interface(correlation_id.clone());
            let status = match interface {
                InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
                InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err(failure(status, interface.user_message(), correlation_id))
        }
    }
}

pub async fn recent_history(
    State(state): State<ApiState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryItem>>, ApiFailure> {
    let limit = query.limit.unwrap_or(state.recent_limit).clamp(1, MAX_HISTORY_LIMIT);

    match state.history.read_recent(limit).await {
        Ok(entries) => Ok(Json(entries.into_iter().map(HistoryItem::from).collect())),
        Err(error) => {
            let correlation_id = Uuid::new_v4().to_string();
            warn!(
                event_name = "api.history.unavailable",
                correlation_id = %correlation_id,
                error = %error,
                "history read failed"
            );
            Err(failure(
                StatusCode::SERVICE_UNAVAILABLE,
                "search history is unavailable",
                correlation_id,
            ))
        }
    }
}

pub async fn download_report(
    State(state): State<ApiState>,
    Path(file): Path<String>,
) -> Result<impl IntoResponse, ApiFailure> {
    let path = state
        .reports
        .locate(&file)
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "report not found", "unassigned"))?;

    let markdown = tokio::fs::read_to_string(&path).await.map_err(|error| {
        warn!(
            event_name = "api.report.read_failed",
            path = %path.display(),
            error = %error,
            "report read failed"
        );
        failure(StatusCode::INTERNAL_SERVER_ERROR, "report could not be read", "unassigned")
    })?;

    info!(event_name = "api.report.downloaded", file = %file, "report downloaded");
    Ok((
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{file}\"")),
        ],
        markdown,
    ))
}
