use async_trait::async_trait;
use thiserror::Error;

use pricescout_core::domain::history::HistoryEntry;

pub mod history;
pub mod memory;

pub use history::SqlHistoryRepository;
pub use memory::InMemoryHistoryRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Append-only storage of completed comparisons.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    async fn append(&self, entry: HistoryEntry) -> Result<(), RepositoryError>;

    /// Up to `limit` entries, newest first.
    async fn read_recent(&self, limit: u32) -> Result<Vec<HistoryEntry>, RepositoryError>;
}
