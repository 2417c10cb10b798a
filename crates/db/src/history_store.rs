use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

use pricescout_core::domain::history::{HistoryEntry, HistoryEntryId};
use pricescout_core::domain::result::ReconciledResult;

use crate::repositories::{HistoryRepository, RepositoryError, SqlHistoryRepository};
use crate::DbPool;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("history store did not respond within {0:?}")]
    TimedOut(Duration),
}

/// What happened to a history write. A skipped write never fails the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AppendOutcome {
    Recorded { id: HistoryEntryId },
    Skipped { reason: String },
}

impl AppendOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded { .. })
    }
}

/// Time-bounded front for a [`HistoryRepository`].
#[derive(Clone)]
pub struct HistoryStore {
    repository: Arc<dyn HistoryRepository>,
    write_timeout: Duration,
}

impl HistoryStore {
    pub fn new(repository: Arc<dyn HistoryRepository>, write_timeout: Duration) -> Self {
        Self { repository, write_timeout }
    }

    pub fn sql(pool: DbPool, write_timeout: Duration) -> Self {
        Self::new(Arc::new(SqlHistoryRepository::new(pool)), write_timeout)
    }

    pub async fn append(&self, query: &str, result: &ReconciledResult) -> AppendOutcome {
        self.append_at(query, result, Utc::now()).await
    }

    /// Stores one entry for `query`. Storage errors and timeouts are logged and
    /// reported as [`AppendOutcome::Skipped`].
    pub async fn append_at(
        &self,
        query: &str,
        result: &ReconciledResult,
        created_at: DateTime<Utc>,
    ) -> AppendOutcome {
        let entry = HistoryEntry::new(query, result.clone(), created_at);
        let id = entry.id.clone();

        let reason = match timeout(self.write_timeout, self.repository.append(entry)).await {
            Ok(Ok(())) => {
                debug!(
                    event_name = "history.append.recorded",
                    history_id = %id.0,
                    query = %query,
                    "history entry recorded"
                );
                return AppendOutcome::Recorded { id };
            }
            Ok(Err(error)) => error.to_string(),
            Err(_) => HistoryError::TimedOut(self.write_timeout).to_string(),
        };

        warn!(
            event_name = "history.append.skipped",
            query = %query,
            reason = %reason,
            "history write skipped"
        );
        AppendOutcome::Skipped { reason }
    }

    /// The `limit` most recent entries, newest first.
    pub async fn read_recent(&self, limit: u32) -> Result<Vec<HistoryEntry>, HistoryError> {
        match timeout(self.write_timeout, self.repository.read_recent(limit)).await {
            Ok(entries) => Ok(entries?),
            Err(_) => Err(HistoryError::TimedOut(self.write_timeout)),
        }
    }
}
