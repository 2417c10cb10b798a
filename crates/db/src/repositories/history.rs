use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use pricescout_core::domain::history::{HistoryEntry, HistoryEntryId};
use pricescout_core::domain::result::ReconciledResult;

use super::{HistoryRepository, RepositoryError};
use crate::DbPool;

pub struct SqlHistoryRepository {
    pool: DbPool,
}

impl SqlHistoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryRepository for SqlHistoryRepository {
    async fn append(&self, entry: HistoryEntry) -> Result<(), RepositoryError> {
        let result_json = serde_json::to_string(&entry.result)
            .map_err(|error| RepositoryError::Decode(format!("encode result: {error}")))?;
        let best = entry.result.best();

        sqlx::query(
            r#"
            INSERT INTO search_history (
                id, query, status, best_platform, best_price, platform_count,
                result_json, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id.0)
        .bind(&entry.query)
        .bind(entry.result.status().as_str())
        .bind(best.map(|listing| listing.platform.name().to_string()))
        .bind(best.map(|listing| listing.price.to_string()))
        .bind(entry.result.platform_count() as i64)
        .bind(result_json)
        .bind(format_timestamp(entry.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn read_recent(&self, limit: u32) -> Result<Vec<HistoryEntry>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, query, result_json, created_at
            FROM search_history
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }
}

fn row_to_entry(row: &SqliteRow) -> Result<HistoryEntry, RepositoryError> {
    let id: String = row.try_get("id")?;
    let result_json: String = row.try_get("result_json")?;
    let created_at: String = row.try_get("created_at")?;

    let result: ReconciledResult = serde_json::from_str(&result_json).map_err(|error| {
        RepositoryError::Decode(format!("invalid result_json for `{id}`: {error}"))
    })?;

    Ok(HistoryEntry {
        id: HistoryEntryId(id),
        query: row.try_get("query")?,
        result,
        created_at: parse_timestamp("created_at", created_at)?,
    })
}

// Fixed-width UTC timestamps keep text ordering equal to time ordering.
fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp in `{column}`: {e}")))
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use sqlx::Row;

    use pricescout_core::domain::history::HistoryEntry;
    use pricescout_core::domain::listing::{ListingRecord, Platform};
    use pricescout_core::reconcile::reconcile;

    use super::SqlHistoryRepository;
    use crate::repositories::HistoryRepository;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 10, 8, 0, 0).single().expect("valid timestamp")
    }

    fn entry(query: &str, minutes: i64) -> HistoryEntry {
        let at = base_time() + Duration::minutes(minutes);
        let listings = vec![
            ListingRecord::new("iPhone 15 128GB", Platform::Daraz, Decimal::new(299_999, 0), at)
                .expect("valid listing"),
            ListingRecord::new("iPhone 15 128GB", Platform::Olx, Decimal::new(285_000, 0), at)
                .expect("valid listing"),
        ];
        HistoryEntry::new(query, reconcile(query, listings, at), at)
    }

    #[tokio::test]
    async fn appended_entry_round_trips_with_summary_columns() {
        let pool = setup_pool().await;
        let repo = SqlHistoryRepository::new(pool.clone());
        let original = entry("iphone 15", 0);

        repo.append(original.clone()).await.expect("append");

        let row = sqlx::query(
            "SELECT status, best_platform, best_price, platform_count FROM search_history",
        )
        .fetch_one(&pool)
        .await
        .expect("summary row");
        assert_eq!(row.get::<String, _>("status"), "found");
        assert_eq!(row.get::<Option<String>, _>("best_platform").as_deref(), Some("OLX"));
        assert_eq!(row.get::<Option<String>, _>("best_price").as_deref(), Some("285000"));
        assert_eq!(row.get::<i64, _>("platform_count"), 2);

        let recent = repo.read_recent(10).await.expect("read recent");
        assert_eq!(recent, vec![original]);
    }

    #[tokio::test]
    async fn read_recent_is_newest_first_and_limited() {
        let pool = setup_pool().await;
        let repo = SqlHistoryRepository::new(pool);

        for (query, minutes) in [("first", 0), ("second", 5), ("third", 10)] {
            repo.append(entry(query, minutes)).await.expect("append");
        }

        let recent = repo.read_recent(2).await.expect("read recent");
        let queries: Vec<&str> = recent.iter().map(|entry| entry.query.as_str()).collect();
        assert_eq!(queries, vec!["third", "second"]);
    }

    #[tokio::test]
    async fn no_data_results_store_null_best_columns() {
        let pool = setup_pool().await;
        let repo = SqlHistoryRepository::new(pool.clone());
        let at = base_time();
        let empty = HistoryEntry::new("nothing", reconcile("nothing", Vec::new(), at), at);

        repo.append(empty).await.expect("append");

        let row = sqlx::query("SELECT status, best_platform FROM search_history")
            .fetch_one(&pool)
            .await
            .expect("summary row");
        assert_eq!(row.get::<String, _>("status"), "no_data");
        assert!(row.get::<Option<String>, _>("best_platform").is_none());

        let recent = repo.read_recent(1).await.expect("read recent");
        assert!(recent[0].result.is_no_data());
    }

    #[tokio::test]
    async fn corrupt_result_json_is_a_decode_error() {
        let pool = setup_pool().await;
        sqlx::query(
            "INSERT INTO search_history (id, query, status, platform_count, result_json, created_at)
             VALUES ('bad', 'q', 'found', 0, '{not json', '2026-02-10T08:00:00.000000Z')",
        )
        .execute(&pool)
        .await
        .expect("insert corrupt row");

        let repo = SqlHistoryRepository::new(pool);
        let error = repo.read_recent(5).await.expect_err("decode should fail");
        assert!(error.to_string().contains("invalid result_json"));
    }
}
