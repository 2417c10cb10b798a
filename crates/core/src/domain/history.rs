use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::result::ReconciledResult;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryEntryId(pub String);

impl HistoryEntryId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Append-only record of one completed query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: HistoryEntryId,
    pub query: String,
    pub result: ReconciledResult,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(
        query: impl Into<String>,
        result: ReconciledResult,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self { id: HistoryEntryId::generate(), query: query.into(), result, created_at }
    }
}
