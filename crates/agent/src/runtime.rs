use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use pricescout_core::config::AppConfig;
use pricescout_core::domain::result::ReconciledResult;
use pricescout_core::errors::{ApplicationError, DomainError};
use pricescout_core::normalize::{NormalizationStats, Normalizer};
use pricescout_core::reconcile::reconcile_now;
use pricescout_core::report::{ComparisonReport, ReportComposer, ReportWriter};
use pricescout_db::{AppendOutcome, HistoryStore};

use crate::llm::{ChatCompletionClient, LlmError};
use crate::narrative::NarrativeWriter;
use crate::sources::{collect, ListingSource, ScrapeFileSource, SearchApiSource, SourceError};

/// Everything produced by one comparison run.
#[derive(Clone, Debug, Serialize)]
pub struct ComparisonOutcome {
    pub correlation_id: String,
    pub result: ReconciledResult,
    pub stats: NormalizationStats,
    pub report: ComparisonReport,
    pub report_path: Option<PathBuf>,
    /// `None` when the runtime has no history store attached.
    pub history: Option<AppendOutcome>,
}

/// Runs fetch, normalize, reconcile, narrate, compose and persist for a
/// single query. Queries are processed one at a time by the caller.
pub struct ComparisonRuntime {
    sources: Vec<Arc<dyn ListingSource>>,
    normalizer: Normalizer,
    narrative: NarrativeWriter,
    composer: ReportComposer,
    report_writer: Option<ReportWriter>,
    history: Option<HistoryStore>,
}

impl ComparisonRuntime {
    pub fn new(
        sources: Vec<Arc<dyn ListingSource>>,
        normalizer: Normalizer,
        composer: ReportComposer,
    ) -> Self {
        Self {
            sources,
            normalizer,
            narrative: NarrativeWriter::disabled(),
            composer,
            report_writer: None,
            history: None,
        }
    }

    /// Wires sources, narrative and report output from configuration.
    /// `extra_scrape_files` are read after the `sources.scrape_files` from
    /// config; a path listed in both is read once. Collaborators without
    /// credentials are left out and logged.
    pub fn from_config(
        config: &AppConfig,
        extra_scrape_files: &[PathBuf],
        history: Option<HistoryStore>,
    ) -> Result<Self, ApplicationError> {
        let mut sources: Vec<Arc<dyn ListingSource>> = Vec::new();

        match SearchApiSource::from_config(&config.search) {
            Ok(source) => sources.push(Arc::new(source)),
            Err(SourceError::NotConfigured(reason)) => {
                warn!(
                    event_name = "pipeline.source.disabled",
                    source = SearchApiSource::NAME,
                    reason = %reason,
                    "search source disabled"
                );
            }
            Err(error) => return Err(ApplicationError::Integration(error.to_string())),
        }

        let mut scrape_files: Vec<&PathBuf> = Vec::new();
        for path in config.sources.scrape_files.iter().chain(extra_scrape_files) {
            if !scrape_files.contains(&path) {
                scrape_files.push(path);
            }
        }
        for path in scrape_files {
            sources.push(Arc::new(ScrapeFileSource::new(path.clone())));
        }

        let narrative = match ChatCompletionClient::from_config(&config.llm) {
            Ok(client) => NarrativeWriter::new(Arc::new(client)),
            Err(LlmError::NotConfigured(reason)) => {
                warn!(
                    event_name = "pipeline.narrative.disabled",
                    reason = %reason,
                    "narrative disabled"
                );
                NarrativeWriter::disabled()
            }
            Err(error) => return Err(ApplicationError::Integration(error.to_string())),
        };

        let normalizer = Normalizer::new(config.normalizer.settings());
        let mut runtime = Self::new(sources, normalizer, ReportComposer::new()?)
            .with_narrative(narrative)
            .with_report_writer(ReportWriter::new(config.reports.directory.clone()));
        if let Some(history) = history {
            runtime = runtime.with_history(history);
        }
        Ok(runtime)
    }

    pub fn with_narrative(mut self, narrative: NarrativeWriter) -> Self {
        self.narrative = narrative;
        self
    }

    pub fn with_report_writer(mut self, writer: ReportWriter) -> Self {
        self.report_writer = Some(writer);
        self
    }

    pub fn with_history(mut self, history: HistoryStore) -> Self {
        self.history = Some(history);
        self
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|source| source.name().to_string()).collect()
    }

    pub fn narrative_enabled(&self) -> bool {
        self.narrative.is_enabled()
    }

    pub async fn run(&self, query: &str) -> Result<ComparisonOutcome, ApplicationError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(DomainError::EmptyQuery.into());
        }

        let correlation_id = Uuid::new_v4().to_string();
        info!(
            event_name = "pipeline.run.started",
            correlation_id = %correlation_id,
            query = %query,
            source_count = self.sources.len(),
            "comparison started"
        );

        let mut batches = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            batches.push(collect(source.as_ref(), query).await);
        }

        let normalized = self.normalizer.normalize(query, &batches);
        let result = reconcile_now(query, normalized.listings);
        let narrative = self.narrative.narrate(&result).await;
        let report = self.composer.compose(&result, narrative.as_deref())?;

        let report_path = match &self.report_writer {
            Some(writer) => match writer.write(&report) {
                Ok(path) => Some(path),
                Err(error) => {
                    warn!(
                        event_name = "pipeline.report.write_failed",
                        correlation_id = %correlation_id,
                        error = %error,
                        "report file not written"
                    );
                    None
                }
            },
            None => None,
        };

        let history = match &self.history {
            Some(store) => Some(store.append(query, &result).await),
            None => None,
        };

        info!(
            event_name = "pipeline.run.completed",
            correlation_id = %correlation_id,
            query = %query,
            status = result.status().as_str(),
            listing_count = result.listings().len(),
            platform_count = result.platform_count(),
            dropped = normalized.stats.dropped(),
            narrative_included = report.narrative_included,
            "comparison completed"
        );

        Ok(ComparisonOutcome {
            correlation_id,
            result,
            stats: normalized.stats,
            report,
            report_path,
            history,
        })
    }
}
