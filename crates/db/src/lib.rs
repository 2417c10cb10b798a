pub mod connection;
pub mod history_store;
pub mod migrations;
pub mod repositories;

pub use connection::{connect_with_settings, ping, DbPool};
pub use history_store::{AppendOutcome, HistoryError, HistoryStore};
pub use repositories::{
    HistoryRepository, InMemoryHistoryRepository, RepositoryError, SqlHistoryRepository,
};
