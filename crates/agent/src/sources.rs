use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use pricescout_core::config::SearchConfig;
use pricescout_core::normalize::{RawListing, ScrapePayload, SearchSnippet, SourceBatch};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source is not configured: {0}")]
    NotConfigured(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("search api returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode source payload: {0}")]
    Decode(String),
    #[error("source io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("all {attempted} search queries failed; last error: {last_error}")]
    AllQueriesFailed { attempted: usize, last_error: String },
}

/// Anything that can produce raw listings for a query.
#[async_trait]
pub trait ListingSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, query: &str) -> Result<Vec<RawListing>, SourceError>;
}

/// Runs one source and folds failure into the batch so a broken source never
/// aborts the comparison.
pub async fn collect(source: &dyn ListingSource, query: &str) -> SourceBatch {
    match source.fetch(query).await {
        Ok(listings) => {
            info!(
                event_name = "pipeline.fetch.delivered",
                source = %source.name(),
                listing_count = listings.len(),
                "source delivered listings"
            );
            SourceBatch::delivered(source.name(), listings, Utc::now())
        }
        Err(error) => {
            warn!(
                event_name = "pipeline.fetch.failed",
                source = %source.name(),
                error = %error,
                "source failed"
            );
            SourceBatch::failed(source.name(), error.to_string(), Utc::now())
        }
    }
}

const TARGET_SITES: &[&str] =
    &["priceoye.pk", "olx.com.pk", "telemart.pk", "shophive.pk", "daraz.pk"];

/// Site-targeted queries first, then broader regional ones.
pub fn search_queries(product: &str) -> Vec<String> {
    let product = product.trim();
    let mut queries: Vec<String> =
        TARGET_SITES.iter().map(|site| format!("{product} site:{site}")).collect();
    queries.push(format!("{product} price Pakistan buy online"));
    queries.push(format!("buy {product} Pakistan online"));
    queries.push(format!("{product} Pakistan price comparison"));
    queries
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
    num: u32,
    hl: &'static str,
    gl: &'static str,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Web search API client (Serper-compatible `POST /search`).
pub struct SearchApiSource {
    client: Client,
    endpoint: String,
    api_key: SecretString,
    results_per_query: u32,
    query_delay: Duration,
}

impl SearchApiSource {
    pub const NAME: &'static str = "search";

    pub fn new(
        endpoint: impl Into<String>,
        api_key: SecretString,
        results_per_query: u32,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| SourceError::NotConfigured(format!("http client: {error}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            results_per_query: results_per_query.max(1),
            query_delay: Duration::from_millis(500),
        })
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self, SourceError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.expose_secret().trim().is_empty())
            .ok_or_else(|| SourceError::NotConfigured("search.api_key is not set".to_string()))?;
        Self::new(
            config.base_url.clone(),
            api_key,
            config.results_per_query,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Pause between consecutive queries to stay under the API rate limit.
    pub fn with_query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = delay;
        self
    }

    async fn search(&self, query: &str) -> Result<Vec<OrganicResult>, SourceError> {
        let body = SearchRequest { q: query, num: self.results_per_query, hl: "en", gl: "pk" };
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| SourceError::Http(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let text = response.text().await.map_err(|error| SourceError::Http(error.to_string()))?;
        let parsed: SearchResponse =
            serde_json::from_str(&text).map_err(|error| SourceError::Decode(error.to_string()))?;
        Ok(parsed.organic)
    }
}

#[async_trait]
impl ListingSource for SearchApiSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch(&self, query: &str) -> Result<Vec<RawListing>, SourceError> {
        let queries = search_queries(query);
        let mut listings = Vec::new();
        let mut last_error = None;
        let mut succeeded = 0usize;

        for (index, search_query) in queries.iter().enumerate() {
            if index > 0 && !self.query_delay.is_zero() {
                tokio::time::sleep(self.query_delay).await;
            }

            match self.search(search_query).await {
                Ok(results) => {
                    succeeded += 1;
                    listings.extend(results.into_iter().map(|result| {
                        RawListing::Searched(SearchSnippet {
                            title: result.title,
                            snippet: result.snippet,
                            url: result.link,
                            platform_hint: None,
                        })
                    }));
                }
                Err(error) => {
                    warn!(
                        event_name = "pipeline.fetch.query_failed",
                        search_query = %search_query,
                        error = %error,
                        "search query failed"
                    );
                    last_error = Some(error.to_string());
                }
            }
        }

        match (succeeded, last_error) {
            (0, Some(last_error)) => {
                Err(SourceError::AllQueriesFailed { attempted: queries.len(), last_error })
            }
            _ => Ok(listings),
        }
    }
}

/// Reads scraper output from a JSON file: either one payload object or an
/// array of them.
pub struct ScrapeFileSource {
    path: PathBuf,
    name: String,
}

impl ScrapeFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("scrape:{}", file_label(&path));
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScrapeDocument {
    Many(Vec<ScrapePayload>),
    One(ScrapePayload),
}

#[async_trait]
impl ListingSource for ScrapeFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _query: &str) -> Result<Vec<RawListing>, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let document: ScrapeDocument =
            serde_json::from_str(&raw).map_err(|error| SourceError::Decode(error.to_string()))?;
        let payloads = match document {
            ScrapeDocument::Many(payloads) => payloads,
            ScrapeDocument::One(payload) => vec![payload],
        };
        Ok(payloads.into_iter().map(RawListing::Scraped).collect())
    }
}

fn file_label(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string())
}
