//! Turns raw collaborator payloads into a de-duplicated set of
//! [`ListingRecord`]s.
//!
//! Records that cannot be trusted (no title, no parseable price, off-region
//! or off-query search hits) are dropped and only counted in
//! [`NormalizationStats`]; nothing here is fatal. Duplicates are listings on
//! the same platform whose titles match after normalization, and the cheaper
//! one survives.

pub mod bands;
pub mod price;
pub mod raw;
pub mod title;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::domain::listing::{ListingRecord, Platform};

pub use raw::{RawListing, ScrapePayload, SearchSnippet, SourceBatch};

const REGIONAL_HOSTS: &[&str] = &[
    "daraz.pk",
    "priceoye.pk",
    "olx.com.pk",
    "telemart.pk",
    "shophive.pk",
    "homeshopping.pk",
    "symbios.pk",
    "goto.com.pk",
    "yayvo.com",
    "mega.pk",
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizerSettings {
    /// 1.0 means titles must be equal after normalization.
    pub title_similarity_threshold: f64,
    pub enforce_price_bands: bool,
    pub require_query_match: bool,
}

impl Default for NormalizerSettings {
    fn default() -> Self {
        Self {
            title_similarity_threshold: 1.0,
            enforce_price_bands: true,
            require_query_match: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationStats {
    pub received: usize,
    pub kept: usize,
    pub missing_title: usize,
    pub unparsable_price: usize,
    pub implausible_price: usize,
    pub off_region: usize,
    pub off_query: usize,
    pub duplicate_url: usize,
    pub duplicate_title: usize,
    pub failed_sources: Vec<String>,
}

impl NormalizationStats {
    pub fn dropped(&self) -> usize {
        self.received - self.kept
    }

    fn record(&mut self, reason: DropReason) {
        match reason {
            DropReason::MissingTitle => self.missing_title += 1,
            DropReason::UnparsablePrice => self.unparsable_price += 1,
            DropReason::ImplausiblePrice => self.implausible_price += 1,
            DropReason::OffRegion => self.off_region += 1,
            DropReason::OffQuery => self.off_query += 1,
            DropReason::DuplicateUrl => self.duplicate_url += 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedListings {
    pub listings: Vec<ListingRecord>,
    pub stats: NormalizationStats,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DropReason {
    MissingTitle,
    UnparsablePrice,
    ImplausiblePrice,
    OffRegion,
    OffQuery,
    DuplicateUrl,
}

impl DropReason {
    fn as_str(&self) -> &'static str {
        match self {
            Self::MissingTitle => "missing_title",
            Self::UnparsablePrice => "unparsable_price",
            Self::ImplausiblePrice => "implausible_price",
            Self::OffRegion => "off_region",
            Self::OffQuery => "off_query",
            Self::DuplicateUrl => "duplicate_url",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Normalizer {
    settings: NormalizerSettings,
}

impl Normalizer {
    pub fn new(settings: NormalizerSettings) -> Self {
        Self { settings }
    }

    pub fn normalize(&self, query: &str, batches: &[SourceBatch]) -> NormalizedListings {
        let mut stats = NormalizationStats::default();
        let mut seen_urls = HashSet::new();
        let mut kept: Vec<ListingRecord> = Vec::new();

        for batch in batches {
            if let Some(reason) = &batch.failure {
                debug!(
                    event_name = "pipeline.normalize.source_failed",
                    source = %batch.source,
                    reason = %reason,
                    "source delivered no listings"
                );
                stats.failed_sources.push(batch.source.clone());
                continue;
            }

            for raw in &batch.listings {
                stats.received += 1;
                let converted = match raw {
                    RawListing::Scraped(payload) => {
                        self.convert_scrape(query, &batch.source, payload, batch.retrieved_at)
                    }
                    RawListing::Searched(snippet) => {
                        self.convert_search(query, snippet, batch.retrieved_at, &mut seen_urls)
                    }
                };

                match converted {
                    Ok(record) => {
                        if self.merge(&mut kept, record) {
                            stats.duplicate_title += 1;
                        }
                    }
                    Err(reason) => {
                        debug!(
                            event_name = "pipeline.normalize.dropped",
                            source = %batch.source,
                            reason = reason.as_str(),
                            "raw listing dropped"
                        );
                        stats.record(reason);
                    }
                }
            }
        }

        stats.kept = kept.len();
        NormalizedListings { listings: kept, stats }
    }

    fn convert_scrape(
        &self,
        query: &str,
        source: &str,
        payload: &ScrapePayload,
        retrieved_at: DateTime<Utc>,
    ) -> Result<ListingRecord, DropReason> {
        let title = non_empty_title(&payload.title)?;
        let url = payload.url.clone().unwrap_or_default();
        let platform = payload
            .platform
            .as_deref()
            .map(Platform::from_hint)
            .or_else(|| Platform::from_url(&url))
            .unwrap_or_else(|| Platform::from_hint(source));

        self.check_query(query, &title)?;
        let price = self.parse_price(&title, &payload.price_text)?;
        let rating = payload
            .rating
            .filter(|value| value.is_finite() && (0.0..=5.0).contains(value))
            .and_then(|value| Decimal::try_from(value).ok())
            .map(|value| value.round_dp(1));

        build(title, platform, price, retrieved_at).map(|record| {
            record.with_url(url).with_rating(rating).with_seller(payload.seller.clone())
        })
    }

    fn convert_search(
        &self,
        query: &str,
        snippet: &SearchSnippet,
        retrieved_at: DateTime<Utc>,
        seen_urls: &mut HashSet<String>,
    ) -> Result<ListingRecord, DropReason> {
        let url = snippet.url.trim().to_string();
        if !url.is_empty() && !seen_urls.insert(url.clone()) {
            return Err(DropReason::DuplicateUrl);
        }
        if !is_regional(snippet) {
            return Err(DropReason::OffRegion);
        }

        let title = non_empty_title(&snippet.title)?;
        self.check_query(query, &title)?;

        let platform = Platform::from_url(&url)
            .or_else(|| snippet.platform_hint.as_deref().map(Platform::from_hint))
            .unwrap_or_else(|| Platform::Other(String::new()));
        let text = format!("{} {}", snippet.title, snippet.snippet);
        let price = self.parse_price(&title, &text)?;

        build(title, platform, price, retrieved_at).map(|record| record.with_url(url))
    }

    fn check_query(&self, query: &str, title: &str) -> Result<(), DropReason> {
        if self.settings.require_query_match && !title::matches_query(query, title) {
            return Err(DropReason::OffQuery);
        }
        Ok(())
    }

    fn parse_price(&self, title: &str, text: &str) -> Result<Decimal, DropReason> {
        if !self.settings.enforce_price_bands {
            return price::extract_price(text).ok_or(DropReason::UnparsablePrice);
        }

        price::extract_price_where(text, |amount| bands::is_plausible(title, amount)).ok_or_else(
            || match price::extract_price(text) {
                Some(_) => DropReason::ImplausiblePrice,
                None => DropReason::UnparsablePrice,
            },
        )
    }

    /// Adds `record` to `kept`, or replaces its duplicate when cheaper.
    /// Returns true when `record` was a duplicate.
    fn merge(&self, kept: &mut Vec<ListingRecord>, record: ListingRecord) -> bool {
        let threshold = self.settings.title_similarity_threshold;
        let duplicate = kept.iter_mut().find(|existing| {
            existing.platform == record.platform
                && title::titles_match(&existing.title, &record.title, threshold)
        });

        match duplicate {
            Some(existing) => {
                if record.price < existing.price {
                    *existing = record;
                }
                true
            }
            None => {
                kept.push(record);
                false
            }
        }
    }
}

fn non_empty_title(raw: &str) -> Result<String, DropReason> {
    let title = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if title::normalize_title(&title).is_empty() {
        return Err(DropReason::MissingTitle);
    }
    Ok(title)
}

fn build(
    title: String,
    platform: Platform,
    price: Decimal,
    retrieved_at: DateTime<Utc>,
) -> Result<ListingRecord, DropReason> {
    ListingRecord::new(title, platform, price, retrieved_at)
        .map_err(|_| DropReason::UnparsablePrice)
}

fn is_regional(snippet: &SearchSnippet) -> bool {
    let host = url::Url::parse(snippet.url.trim()).ok().and_then(|parsed| {
        parsed.host_str().map(|host| host.trim_start_matches("www.").to_ascii_lowercase())
    });

    if let Some(host) = &host {
        let known = REGIONAL_HOSTS
            .iter()
            .any(|domain| host.as_str() == *domain || host.ends_with(&format!(".{domain}")));
        if known || host.ends_with(".pk") {
            return true;
        }
    } else if snippet
        .platform_hint
        .as_deref()
        .is_some_and(|hint| Platform::from_hint(hint).is_tracked())
    {
        return true;
    }

    let text = format!("{} {}", snippet.title, snippet.snippet).to_lowercase();
    text.contains("pakistan")
}
