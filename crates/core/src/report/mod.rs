//! Markdown comparison reports.
//!
//! The composer renders a [`ReconciledResult`] and an optional narrative into
//! a markdown document using the embedded `comparison.md.tera` template. All
//! amounts are pre-formatted here so the template stays free of arithmetic.

mod file;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tera::{Context, Tera};

use crate::domain::listing::ListingRecord;
use crate::domain::result::{money, ReconciledResult};

pub use file::{is_report_file_name, report_file_name, ReportWriter, REPORT_SUFFIX};

const TEMPLATE_NAME: &str = "comparison.md.tera";

pub const NARRATIVE_PLACEHOLDER: &str = "Market analysis is unavailable for this search. \
The figures above are based only on the listings that were found.";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("template error: {0}")]
    Template(String),
    #[error("report io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rendered report, ready to be written or served.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComparisonReport {
    pub query: String,
    pub file_name: String,
    pub markdown: String,
    pub generated_at: DateTime<Utc>,
    pub narrative_included: bool,
}

#[derive(Serialize)]
struct RankedRow {
    rank: usize,
    platform: String,
    title: String,
    price: String,
    delta: String,
    link: String,
}

#[derive(Serialize)]
struct SummaryView {
    best_price: String,
    best_platform: String,
    highest_price: String,
    highest_platform: String,
    savings: String,
    savings_percentage: String,
    average: String,
}

#[derive(Serialize)]
struct DealRow {
    platform: String,
    price: String,
    title: String,
}

#[derive(Clone, Debug)]
pub struct ReportComposer {
    tera: Tera,
}

impl ReportComposer {
    pub fn new() -> Result<Self, ReportError> {
        let mut tera = Tera::default();
        tera.autoescape_on(Vec::new());
        tera.add_raw_template(
            TEMPLATE_NAME,
            include_str!("../../../../templates/reports/comparison.md.tera"),
        )
        .map_err(|error| ReportError::Template(error.to_string()))?;
        Ok(Self { tera })
    }

    /// Renders `result` with `narrative` included verbatim. A missing or blank
    /// narrative is replaced by [`NARRATIVE_PLACEHOLDER`].
    pub fn compose(
        &self,
        result: &ReconciledResult,
        narrative: Option<&str>,
    ) -> Result<ComparisonReport, ReportError> {
        let narrative = narrative.filter(|text| !text.trim().is_empty());
        let generated_at = result.reconciled_at();

        let mut context = Context::new();
        context.insert("query", result.query());
        context.insert("generated_at", &generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string());
        context.insert("listings_analyzed", &result.listings().len());
        context.insert("platform_count", &result.platform_count());
        context.insert("currency", result.currency().code());
        context.insert("found", &!result.is_no_data());
        context.insert("rows", &ranked_rows(result));
        context.insert("summary", &summary(result));
        context.insert("best_deals", &best_deals(result));
        context.insert("narrative", narrative.unwrap_or(NARRATIVE_PLACEHOLDER));

        let markdown = self
            .tera
            .render(TEMPLATE_NAME, &context)
            .map_err(|error| ReportError::Template(error.to_string()))?;

        Ok(ComparisonReport {
            query: result.query().to_string(),
            file_name: report_file_name(result.query(), generated_at),
            markdown,
            generated_at,
            narrative_included: narrative.is_some(),
        })
    }
}

fn ranked_rows(result: &ReconciledResult) -> Vec<RankedRow> {
    result
        .listings()
        .iter()
        .enumerate()
        .map(|(index, listing)| RankedRow {
            rank: index + 1,
            platform: cell(listing.platform.name()),
            title: cell(&listing.title),
            price: format_price(listing.price),
            delta: if index == 0 {
                "Best price".to_string()
            } else {
                format!("+{}", format_price(result.delta_from_best(listing)))
            },
            link: link(listing),
        })
        .collect()
}

fn summary(result: &ReconciledResult) -> Option<SummaryView> {
    let best = result.best()?;
    let highest = result.most_expensive()?;
    Some(SummaryView {
        best_price: format_price(best.price),
        best_platform: best.platform.name().to_string(),
        highest_price: format_price(highest.price),
        highest_platform: highest.platform.name().to_string(),
        savings: format_price(result.spread()),
        savings_percentage: result.savings_percentage().to_string(),
        average: format_price(result.average()),
    })
}

fn best_deals(result: &ReconciledResult) -> Vec<DealRow> {
    result
        .cheapest_per_platform()
        .into_iter()
        .map(|(platform, listing)| DealRow {
            platform,
            price: format_price(listing.price),
            title: listing.title.clone(),
        })
        .collect()
}

fn link(listing: &ListingRecord) -> String {
    if listing.url.trim().is_empty() {
        "-".to_string()
    } else {
        format!("[View]({})", listing.url.trim())
    }
}

// Pipes and newlines would break the markdown table row.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

/// `Rs. 292,499.50` style amount with thousands separators.
pub fn format_price(value: Decimal) -> String {
    format!("Rs. {}", format_amount(value))
}

pub fn format_amount(value: Decimal) -> String {
    let text = money(value).to_string();
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    let (sign, digits) = match whole.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", whole),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}.{fraction}")
}
