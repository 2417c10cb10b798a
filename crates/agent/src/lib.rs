//! Comparison runtime and its external collaborators.
//!
//! Everything that talks to the outside world lives here behind a trait:
//! - [`sources::ListingSource`] for the search API and scrape payload files
//! - [`llm::LlmClient`] for OpenAI-compatible chat completion endpoints
//!
//! [`runtime::ComparisonRuntime`] drives one query through fetch, normalize,
//! reconcile, narrate, compose and persist. Only the listings decide the
//! ranking; the LLM contributes commentary text and nothing else.

pub mod llm;
pub mod narrative;
pub mod runtime;
pub mod sources;

#[cfg(test)]
mod test_support;

pub use llm::{ChatCompletionClient, ChatMessage, LlmClient, LlmError};
pub use narrative::NarrativeWriter;
pub use runtime::{ComparisonOutcome, ComparisonRuntime};
pub use sources::{ListingSource, ScrapeFileSource, SearchApiSource, SourceError};
