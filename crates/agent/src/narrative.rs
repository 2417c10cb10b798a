use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{info, warn};

use pricescout_core::domain::result::ReconciledResult;
use pricescout_core::report::format_price;

use crate::llm::{ChatMessage, LlmClient};

pub const SYSTEM_PROMPT: &str = "You are an expert Pakistani e-commerce analyst. \
Write a concise market commentary that helps a shopper decide where to buy.

Cover:
1. Which offer is the best value and why
2. Platform reliability and reputation
3. Market observations specific to Pakistan
4. Buying recommendations

Use Pakistani Rupees (PKR) for all prices and never invent prices that are not in the data.
Consider PTA approval for electronics, local versus international warranty, \
delivery time and shipping costs within Pakistan, and the payment methods available.

Reply in plain markdown without a top-level heading.";

/// User message carrying the ranked listings and summary figures.
pub fn user_prompt(result: &ReconciledResult) -> String {
    let mut prompt = format!(
        "Compare offers for: \"{}\"\n\nRanked listings (cheapest first):\n",
        result.query()
    );

    for (index, listing) in result.listings().iter().enumerate() {
        let _ = write!(
            prompt,
            "{}. {} | {} | {}",
            index + 1,
            listing.platform.name(),
            listing.title,
            format_price(listing.price)
        );
        if let Some(seller) = &listing.seller {
            let _ = write!(prompt, " | seller: {seller}");
        }
        if let Some(rating) = listing.rating {
            let _ = write!(prompt, " | rating: {rating}");
        }
        if !listing.url.is_empty() {
            let _ = write!(prompt, " | {}", listing.url);
        }
        prompt.push('\n');
    }

    let _ = write!(
        prompt,
        "\nPlatforms compared: {}\nAverage price: {}\nPrice spread: {} ({}%)\n",
        result.platform_count(),
        format_price(result.average()),
        format_price(result.spread()),
        result.savings_percentage()
    );
    prompt
}

/// Produces optional market commentary. Every failure degrades to `None`.
#[derive(Clone, Default)]
pub struct NarrativeWriter {
    client: Option<Arc<dyn LlmClient>>,
}

impl NarrativeWriter {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client: Some(client) }
    }

    pub fn disabled() -> Self {
        Self { client: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    pub async fn narrate(&self, result: &ReconciledResult) -> Option<String> {
        let client = self.client.as_ref()?;
        if result.is_no_data() {
            return None;
        }

        let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user_prompt(result))];
        match client.complete(&messages).await {
            Ok(text) if !text.trim().is_empty() => {
                info!(
                    event_name = "pipeline.narrative.generated",
                    query = %result.query(),
                    chars = text.len(),
                    "narrative generated"
                );
                Some(text)
            }
            Ok(_) => None,
            Err(error) => {
                warn!(
                    event_name = "pipeline.narrative.unavailable",
                    query = %result.query(),
                    error = %error,
                    "narrative unavailable"
                );
                None
            }
        }
    }
}
