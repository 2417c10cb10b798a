use std::sync::Arc;
use std::time::Duration;

use pricescout_agent::ComparisonRuntime;
use pricescout_core::config::{AppConfig, ConfigError};
use pricescout_core::errors::ApplicationError;
use pricescout_db::{connect_with_settings, migrations, DbPool, HistoryStore};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub history: HistoryStore,
    pub comparison: Arc<ComparisonRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("comparison runtime could not be built: {0}")]
    Runtime(#[source] ApplicationError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let history =
        HistoryStore::sql(db_pool.clone(), Duration::from_millis(config.history.write_timeout_ms));
    let comparison = ComparisonRuntime::from_config(&config, &[], Some(history.clone()))
        .map_err(BootstrapError::Runtime)?;
    info!(
        event_name = "system.bootstrap.runtime_ready",
        correlation_id = "bootstrap",
        sources = ?comparison.source_names(),
        narrative_enabled = comparison.narrative_enabled(),
        "comparison runtime ready"
    );

    Ok(Application { config, db_pool, history, comparison: Arc::new(comparison) })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pricescout_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use tempfile::TempDir;

    use crate::bootstrap::{bootstrap_with_config, Application, BootstrapError};

    async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
        bootstrap_with_config(AppConfig::load(options)?).await
    }

    fn options(database_url: &str, reports: &TempDir) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                reports_directory: Some(reports.path().to_path_buf()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_migrates_history_table() {
        let reports = TempDir::new().expect("tempdir");
        let app = bootstrap(options("sqlite::memory:?cache=shared", &reports))
            .await
            .expect("bootstrap should succeed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'search_history'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("query sqlite_master");
        assert_eq!(table_count, 1);
        assert!(app.comparison.source_names().is_empty(), "no search key configured");
        assert!(!app.comparison.narrative_enabled(), "no llm key configured");

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn configured_scrape_files_feed_server_comparisons() {
        let workspace = TempDir::new().expect("tempdir");
        let scrape_file = workspace.path().join("daraz.json");
        fs::write(
            &scrape_file,
            r#"[
                {"platform": "Daraz", "title": "iPhone 15 128GB", "price_text": "Rs. 299,999"},
                {"platform": "OLX", "title": "iPhone 15 128GB", "price_text": "Rs 285,000"}
            ]"#,
        )
        .expect("write scrape file");

        let database_url =
            format!("sqlite://{}?mode=rwc", workspace.path().join("pricescout.db").display());
        let mut load = options(&database_url, &workspace);
        load.overrides.scrape_files = Some(vec![scrape_file]);
        let app = bootstrap(load).await.expect("bootstrap should succeed");

        assert_eq!(app.comparison.source_names(), vec!["scrape:daraz"]);

        let outcome = app.comparison.run("iphone 15").await.expect("comparison");
        assert_eq!(outcome.result.platform_count(), 2);
        assert_eq!(outcome.result.best().map(|best| best.platform.name()), Some("OLX"));

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_non_sqlite_database_url() {
        let reports = TempDir::new().expect("tempdir");
        let result = bootstrap(options("postgres://localhost/pricescout", &reports)).await;

        let message = result.err().expect("bootstrap should fail").to_string();
        assert!(message.contains("database.url"));
    }
}
