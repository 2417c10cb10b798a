//! Domain core for pricescout: listing model, normalization, reconciliation
//! and report composition. Everything here is synchronous and free of network
//! or database access.

pub mod config;
pub mod domain;
pub mod errors;
pub mod normalize;
pub mod reconcile;
pub mod report;

pub use domain::history::{HistoryEntry, HistoryEntryId};
pub use domain::listing::{Currency, ListingRecord, Platform, MAX_LISTING_PRICE};
pub use domain::result::{money, ReconciledResult, ResultStatus};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use normalize::{
    NormalizationStats, NormalizedListings, Normalizer, NormalizerSettings, RawListing,
    ScrapePayload, SearchSnippet, SourceBatch,
};
pub use reconcile::{reconcile, reconcile_now};
pub use report::{ComparisonReport, ReportComposer, ReportError, ReportWriter};
