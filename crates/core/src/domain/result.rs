use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::listing::{Currency, ListingRecord};

pub const MONEY_SCALE: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Found,
    NoData,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Found => "found",
            Self::NoData => "no_data",
        }
    }
}

/// Ranked view of every usable listing found for one query.
///
/// Built once by the reconciler and never mutated afterwards; fields are only
/// reachable through accessors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledResult {
    query: String,
    status: ResultStatus,
    currency: Currency,
    listings: Vec<ListingRecord>,
    best: Option<ListingRecord>,
    spread: Decimal,
    average: Decimal,
    platform_count: usize,
    reconciled_at: DateTime<Utc>,
}

impl ReconciledResult {
    pub(crate) fn found(
        query: String,
        listings: Vec<ListingRecord>,
        spread: Decimal,
        average: Decimal,
        platform_count: usize,
        reconciled_at: DateTime<Utc>,
    ) -> Self {
        let best = listings.first().cloned();
        Self {
            query,
            status: ResultStatus::Found,
            currency: Currency::Pkr,
            listings,
            best,
            spread,
            average,
            platform_count,
            reconciled_at,
        }
    }

    pub fn no_data(query: impl Into<String>, reconciled_at: DateTime<Utc>) -> Self {
        Self {
            query: query.into(),
            status: ResultStatus::NoData,
            currency: Currency::Pkr,
            listings: Vec::new(),
            best: None,
            spread: money(Decimal::ZERO),
            average: money(Decimal::ZERO),
            platform_count: 0,
            reconciled_at,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn status(&self) -> ResultStatus {
        self.status
    }

    pub fn is_no_data(&self) -> bool {
        self.status == ResultStatus::NoData
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Listings sorted ascending by price.
    pub fn listings(&self) -> &[ListingRecord] {
        &self.listings
    }

    pub fn best(&self) -> Option<&ListingRecord> {
        self.best.as_ref()
    }

    pub fn most_expensive(&self) -> Option<&ListingRecord> {
        self.listings.last()
    }

    pub fn spread(&self) -> Decimal {
        self.spread
    }

    pub fn average(&self) -> Decimal {
        self.average
    }

    pub fn platform_count(&self) -> usize {
        self.platform_count
    }

    pub fn reconciled_at(&self) -> DateTime<Utc> {
        self.reconciled_at
    }

    pub fn delta_from_best(&self, listing: &ListingRecord) -> Decimal {
        match &self.best {
            Some(best) => money(listing.price.checked_sub(best.price).unwrap_or(Decimal::ZERO)),
            None => money(Decimal::ZERO),
        }
    }

    /// Largest saving available by buying at the best price instead of the
    /// highest one, as a percentage of the highest price.
    pub fn savings_percentage(&self) -> Decimal {
        match self.most_expensive() {
            Some(highest) if highest.price > Decimal::ZERO => self
                .spread
                .checked_div(highest.price)
                .and_then(|share| share.checked_mul(Decimal::ONE_HUNDRED))
                .map(money)
                .unwrap_or_else(|| money(Decimal::ZERO)),
            _ => money(Decimal::ZERO),
        }
    }

    /// Cheapest listing per platform, keyed by platform name.
    pub fn cheapest_per_platform(&self) -> BTreeMap<String, &ListingRecord> {
        let mut cheapest: BTreeMap<String, &ListingRecord> = BTreeMap::new();
        for listing in &self.listings {
            cheapest.entry(listing.platform.name().to_string()).or_insert(listing);
        }
        cheapest
    }
}

/// Rounds half away from zero and pins the scale so `292499.5` renders as
/// `292499.50`.
pub fn money(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}
