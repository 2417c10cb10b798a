use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structured output of a marketplace scrape for one product page.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapePayload {
    #[serde(default)]
    pub platform: Option<String>,
    pub title: String,
    pub price_text: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub seller: Option<String>,
}

/// Loosely structured organic result returned by the search API.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSnippet {
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub platform_hint: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawListing {
    Scraped(ScrapePayload),
    Searched(SearchSnippet),
}

/// Everything one collaborator produced for a query, or why it produced
/// nothing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceBatch {
    pub source: String,
    pub retrieved_at: DateTime<Utc>,
    pub listings: Vec<RawListing>,
    pub failure: Option<String>,
}

impl SourceBatch {
    pub fn delivered(
        source: impl Into<String>,
        listings: Vec<RawListing>,
        retrieved_at: DateTime<Utc>,
    ) -> Self {
        Self { source: source.into(), retrieved_at, listings, failure: None }
    }

    pub fn failed(
        source: impl Into<String>,
        reason: impl Into<String>,
        retrieved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source: source.into(),
            retrieved_at,
            listings: Vec::new(),
            failure: Some(reason.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}
