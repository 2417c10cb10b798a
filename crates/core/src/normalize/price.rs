use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::domain::listing::MAX_LISTING_PRICE;

// Number shape accepts both 1,234,567 and 12,34,567 grouping.
const PRICE_PATTERNS: &[&str] = &[
    r"(?i)\bRs\.?\s*(\d[\d,]*(?:\.\d{1,2})?)",
    r"(?i)\bPKR\.?\s*(\d[\d,]*(?:\.\d{1,2})?)",
    r"₨\.?\s*(\d[\d,]*(?:\.\d{1,2})?)",
    r"(?i)(\d[\d,]*(?:\.\d{1,2})?)\s*(?:Rs|PKR)\b",
];

static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

fn patterns() -> &'static [Regex] {
    PATTERNS.get_or_init(|| {
        PRICE_PATTERNS.iter().filter_map(|pattern| Regex::new(pattern).ok()).collect()
    })
}

/// First positive amount adjacent to a rupee marker in `text`.
pub fn extract_price(text: &str) -> Option<Decimal> {
    extract_price_where(text, |_| true)
}

/// Like [`extract_price`], but skips candidates rejected by `accept`. Patterns
/// are tried in order and every match of a pattern is considered before
/// moving on.
pub fn extract_price_where<F>(text: &str, accept: F) -> Option<Decimal>
where
    F: Fn(Decimal) -> bool,
{
    patterns()
        .iter()
        .flat_map(|pattern| pattern.captures_iter(text))
        .filter_map(|captures| captures.get(1).and_then(|amount| parse_amount(amount.as_str())))
        .find(|amount| accept(*amount))
}

fn parse_amount(raw: &str) -> Option<Decimal> {
    let digits: String = raw.trim_end_matches(',').chars().filter(|ch| *ch != ',').collect();
    let amount = Decimal::from_str(&digits).ok()?.normalize();
    (amount > Decimal::ZERO && amount <= MAX_LISTING_PRICE).then_some(amount)
}
