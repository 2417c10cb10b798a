use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use pricescout_core::domain::history::HistoryEntry;

use super::{HistoryRepository, RepositoryError};

/// Insertion-ordered history kept in process memory.
///
/// `set_unavailable(true)` makes every call fail the way a locked or missing
/// database would, which lets callers exercise their degraded paths.
#[derive(Default)]
pub struct InMemoryHistoryRepository {
    entries: RwLock<Vec<HistoryEntry>>,
    unavailable: AtomicBool,
}

impl InMemoryHistoryRepository {
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl HistoryRepository for InMemoryHistoryRepository {
    async fn append(&self, entry: HistoryEntry) -> Result<(), RepositoryError> {
        self.check_available()?;
        let mut entries = self.entries.write().await;
        entries.push(entry);
        Ok(())
    }

    async fn read_recent(&self, limit: u32) -> Result<Vec<HistoryEntry>, RepositoryError> {
        self.check_available()?;
        let entries = self.entries.read().await;
        let mut ordered: Vec<(usize, &HistoryEntry)> = entries.iter().enumerate().collect();
        // Newest first; insertion order breaks timestamp ties.
        ordered.sort_by(|(left_index, left), (right_index, right)| {
            right.created_at.cmp(&left.created_at).then(right_index.cmp(left_index))
        });
        Ok(ordered.into_iter().take(limit as usize).map(|(_, entry)| entry.clone()).collect())
    }
}
