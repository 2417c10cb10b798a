use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Largest price a listing may carry: one trillion rupees. Sums and
/// percentages over any realistic number of listings stay inside `Decimal`.
pub const MAX_LISTING_PRICE: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0);

/// Marketplaces a listing can come from. Anything outside the tracked set is
/// kept as `Other` with the host (or hint) it was observed on.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Daraz,
    PriceOye,
    Olx,
    Telemart,
    Shophive,
    Other(String),
}

const KNOWN_HOSTS: &[(&str, Platform)] = &[
    ("daraz.pk", Platform::Daraz),
    ("priceoye.pk", Platform::PriceOye),
    ("olx.com.pk", Platform::Olx),
    ("telemart.pk", Platform::Telemart),
    ("shophive.pk", Platform::Shophive),
];

impl Platform {
    pub fn name(&self) -> &str {
        match self {
            Self::Daraz => "Daraz",
            Self::PriceOye => "PriceOye",
            Self::Olx => "OLX",
            Self::Telemart => "Telemart",
            Self::Shophive => "Shophive",
            Self::Other(label) if label.is_empty() => "Other",
            Self::Other(label) => label,
        }
    }

    pub fn from_host(host: &str) -> Self {
        let host = host.trim().trim_start_matches("www.").to_ascii_lowercase();
        KNOWN_HOSTS
            .iter()
            .find(|(domain, _)| host == *domain || host.ends_with(&format!(".{domain}")))
            .map(|(_, platform)| platform.clone())
            .unwrap_or(Self::Other(host))
    }

    /// Resolves the platform from a listing URL. Returns `None` when the URL
    /// has no parseable host.
    pub fn from_url(link: &str) -> Option<Self> {
        let parsed = url::Url::parse(link.trim()).ok()?;
        let host = parsed.host_str()?;
        Some(Self::from_host(host))
    }

    /// Resolves a free-form source label such as "OLX Pakistan" or "daraz.pk".
    pub fn from_hint(hint: &str) -> Self {
        let lowered = hint.trim().to_ascii_lowercase();
        let compact: String = lowered.chars().filter(|ch| ch.is_ascii_alphanumeric()).collect();

        if compact.starts_with("daraz") {
            Self::Daraz
        } else if compact.starts_with("priceoye") {
            Self::PriceOye
        } else if compact.starts_with("olx") {
            Self::Olx
        } else if compact.starts_with("telemart") {
            Self::Telemart
        } else if compact.starts_with("shophive") {
            Self::Shophive
        } else {
            Self::Other(hint.trim().to_string())
        }
    }

    pub fn is_tracked(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    #[serde(rename = "PKR")]
    Pkr,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Pkr => "PKR",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Pkr => "Rs.",
        }
    }
}

/// One normalized offer for a product on one marketplace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub title: String,
    pub platform: Platform,
    pub price: Decimal,
    pub currency: Currency,
    pub url: String,
    pub rating: Option<Decimal>,
    pub seller: Option<String>,
    pub retrieved_at: DateTime<Utc>,
}

impl ListingRecord {
    pub fn new(
        title: impl Into<String>,
        platform: Platform,
        price: Decimal,
        retrieved_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if price <= Decimal::ZERO {
            return Err(DomainError::InvariantViolation(format!(
                "listing price must be positive, got {price}"
            )));
        }
        if price > MAX_LISTING_PRICE {
            return Err(DomainError::InvariantViolation(format!(
                "listing price must not exceed {MAX_LISTING_PRICE}, got {price}"
            )));
        }

        Ok(Self {
            title: title.into(),
            platform,
            price,
            currency: Currency::Pkr,
            url: String::new(),
            rating: None,
            seller: None,
            retrieved_at,
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_rating(mut self, rating: Option<Decimal>) -> Self {
        self.rating = rating;
        self
    }

    pub fn with_seller(mut self, seller: Option<String>) -> Self {
        self.seller = seller.filter(|value| !value.trim().is_empty());
        self
    }

    pub fn has_valid_price(&self) -> bool {
        self.price > Decimal::ZERO && self.price <= MAX_LISTING_PRICE
    }
}
