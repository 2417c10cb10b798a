use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::listing::ListingRecord;
use crate::domain::result::{money, ReconciledResult};

/// Ranks `listings` for `query`.
///
/// Listings without a positive price are ignored. An empty (or fully
/// ignored) input produces a no-data result rather than an error. Ordering is
/// ascending by price, ties broken by platform name, then title and URL so
/// the output does not depend on input order.
pub fn reconcile(
    query: &str,
    listings: Vec<ListingRecord>,
    reconciled_at: DateTime<Utc>,
) -> ReconciledResult {
    let mut ranked: Vec<ListingRecord> =
        listings.into_iter().filter(ListingRecord::has_valid_price).collect();

    if ranked.is_empty() {
        return ReconciledResult::no_data(query, reconciled_at);
    }

    ranked.sort_by(|left, right| {
        left.price
            .cmp(&right.price)
            .then_with(|| left.platform.name().cmp(right.platform.name()))
            .then_with(|| left.title.cmp(&right.title))
            .then_with(|| left.url.cmp(&right.url))
    });

    let lowest = ranked[0].price;
    let highest = ranked[ranked.len() - 1].price;
    let average = money(mean_price(&ranked));
    let platform_count =
        ranked.iter().map(|listing| &listing.platform).collect::<HashSet<_>>().len();

    ReconciledResult::found(
        query.to_string(),
        ranked,
        money(highest - lowest),
        average,
        platform_count,
        reconciled_at,
    )
}

pub fn reconcile_now(query: &str, listings: Vec<ListingRecord>) -> ReconciledResult {
    reconcile(query, listings, Utc::now())
}

// Falls back to summing pre-divided prices when the plain total would not fit.
fn mean_price(listings: &[ListingRecord]) -> Decimal {
    let count = Decimal::from(listings.len());
    let total = listings
        .iter()
        .try_fold(Decimal::ZERO, |total, listing| total.checked_add(listing.price));

    match total.and_then(|total| total.checked_div(count)) {
        Some(mean) => mean,
        None => listings
            .iter()
            .filter_map(|listing| listing.price.checked_div(count))
            .fold(Decimal::ZERO, |mean, share| mean.saturating_add(share)),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{mean_price, reconcile};
    use crate::domain::listing::{ListingRecord, Platform, MAX_LISTING_PRICE};
    use crate::domain::result::ResultStatus;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid timestamp")
    }

    fn listing(platform: Platform, price: i64) -> ListingRecord {
        ListingRecord::new("iPhone 15 128GB", platform, Decimal::new(price, 0), at())
            .expect("valid listing")
    }

    fn sample() -> Vec<ListingRecord> {
        vec![
            listing(Platform::Daraz, 299_999),
            listing(Platform::PriceOye, 289_999),
            listing(Platform::Telemart, 295_000),
            listing(Platform::Olx, 285_000),
        ]
    }

    #[test]
    fn four_platform_example_is_ranked_and_summarized() {
        let result = reconcile("iphone 15", sample(), at());

        let ranked: Vec<(String, Decimal)> = result
            .listings()
            .iter()
            .map(|listing| (listing.platform.name().to_string(), listing.price))
            .collect();
        assert_eq!(
            ranked,
            vec![
                ("OLX".to_string(), Decimal::new(285_000, 0)),
                ("PriceOye".to_string(), Decimal::new(289_999, 0)),
                ("Telemart".to_string(), Decimal::new(295_000, 0)),
                ("Daraz".to_string(), Decimal::new(299_999, 0)),
            ]
        );

        let best = result.best().expect("best listing");
        assert_eq!(best.platform, Platform::Olx);
        assert_eq!(best.price, Decimal::new(285_000, 0));
        assert_eq!(result.spread(), Decimal::new(14_999, 0));
        assert_eq!(result.average().to_string(), "292499.50");
        assert_eq!(result.platform_count(), 4);
        assert_eq!(result.status(), ResultStatus::Found);
    }

    #[test]
    fn output_is_sorted_ascending_by_price() {
        let prices = [5_000, 1_200, 9_999, 1_200, 3_500, 7_250];
        let platforms = [
            Platform::Daraz,
            Platform::Olx,
            Platform::Shophive,
            Platform::Telemart,
            Platform::PriceOye,
            Platform::Daraz,
        ];
        let listings = platforms
            .iter()
            .cloned()
            .zip(prices)
            .map(|(platform, price)| listing(platform, price))
            .collect();

        let result = reconcile("mouse", listings, at());

        assert!(result.listings().windows(2).all(|pair| pair[0].price <= pair[1].price));
        assert_eq!(result.listings().len(), 6);
    }

    #[test]
    fn equal_prices_are_ordered_by_platform_name() {
        let listings = vec![listing(Platform::Telemart, 1_000), listing(Platform::Daraz, 1_000)];

        let result = reconcile("cable", listings, at());

        assert_eq!(result.listings()[0].platform, Platform::Daraz);
        assert_eq!(result.listings()[1].platform, Platform::Telemart);
    }

    #[test]
    fn average_is_mean_rounded_to_two_places() {
        let listings = vec![
            listing(Platform::Daraz, 100),
            listing(Platform::Olx, 100),
            listing(Platform::Telemart, 101),
        ];

        let result = reconcile("adapter", listings, at());

        // 301 / 3 = 100.333...
        assert_eq!(result.average().to_string(), "100.33");
    }

    #[test]
    fn single_listing_has_zero_spread() {
        let result = reconcile("iphone 15", vec![listing(Platform::Daraz, 299_999)], at());

        assert_eq!(result.spread(), Decimal::ZERO);
        assert_eq!(result.average(), Decimal::new(299_999, 0));
        assert_eq!(result.platform_count(), 1);
    }

    #[test]
    fn platform_count_counts_distinct_sources() {
        let listings = vec![
            listing(Platform::Daraz, 1_000),
            listing(Platform::Daraz, 1_100),
            listing(Platform::Other("mega.pk".to_string()), 1_050),
        ];

        let result = reconcile("charger", listings, at());
        assert_eq!(result.platform_count(), 2);
    }

    #[test]
    fn empty_input_yields_no_data_result() {
        let result = reconcile("unobtainium", Vec::new(), at());

        assert!(result.is_no_data());
        assert_eq!(result.query(), "unobtainium");
        assert!(result.best().is_none());
    }

    #[test]
    fn non_positive_prices_are_ignored() {
        let mut broken = listing(Platform::Daraz, 1_000);
        broken.price = Decimal::ZERO;

        let result = reconcile("charger", vec![broken], at());
        assert!(result.is_no_data());
    }

    #[test]
    fn reconciling_twice_is_identical_apart_from_timestamp() {
        let first = reconcile("iphone 15", sample(), at());
        let mut reversed = sample();
        reversed.reverse();
        let second = reconcile("iphone 15", reversed, at() + Duration::minutes(5));

        let first_json = serde_json::to_value(&first).expect("serialize first");
        let mut second_json = serde_json::to_value(&second).expect("serialize second");
        second_json["reconciled_at"] = first_json["reconciled_at"].clone();

        assert_eq!(first_json, second_json);
        assert_eq!(reconcile("iphone 15", sample(), at()), first);
    }

    #[test]
    fn prices_above_ceiling_are_ignored() {
        let mut inflated = listing(Platform::Olx, 1_000);
        inflated.price = Decimal::MAX;

        let result = reconcile("charger", vec![inflated, listing(Platform::Daraz, 2_000)], at());

        assert_eq!(result.listings().len(), 1);
        assert_eq!(result.average().to_string(), "2000.00");
    }

    #[test]
    fn many_ceiling_prices_average_to_the_ceiling() {
        let listings: Vec<ListingRecord> = [Platform::Daraz, Platform::Olx, Platform::Telemart]
            .into_iter()
            .map(|platform| {
                ListingRecord::new("Gold bar", platform, MAX_LISTING_PRICE, at()).expect("valid")
            })
            .collect();

        let result = reconcile("gold bar", listings, at());
        assert_eq!(result.average(), MAX_LISTING_PRICE);
    }

    #[test]
    fn mean_falls_back_when_total_would_overflow() {
        let mut first = listing(Platform::Olx, 1);
        first.price = Decimal::MAX;
        let second = first.clone();

        let mean = mean_price(&[first, second]);
        assert!(mean >= MAX_LISTING_PRICE);
    }

    mod properties {
        use std::collections::HashSet;

        use proptest::prelude::*;
        use rust_decimal::Decimal;

        use super::at;
        use crate::domain::listing::{ListingRecord, Platform};
        use crate::domain::result::money;
        use crate::reconcile::reconcile;

        fn platform() -> impl Strategy<Value = Platform> {
            prop_oneof![
                Just(Platform::Daraz),
                Just(Platform::PriceOye),
                Just(Platform::Olx),
                Just(Platform::Telemart),
                Just(Platform::Shophive),
                "[a-z]{3,8}\\.pk".prop_map(Platform::Other),
            ]
        }

        // Prices in paisa, from one paisa up to the listing ceiling.
        fn listings() -> impl Strategy<Value = Vec<ListingRecord>> {
            let record = (platform(), "[A-Za-z0-9 ]{1,24}", 1i64..=100_000_000_000_000);
            prop::collection::vec(record, 1..24).prop_map(|records| {
                records
                    .into_iter()
                    .map(|(platform, title, paisa)| {
                        ListingRecord::new(title, platform, Decimal::new(paisa, 2), at())
                            .expect("generated price is in range")
                    })
                    .collect()
            })
        }

        proptest! {
            #[test]
            fn ranked_output_is_sorted_and_led_by_best(listings in listings()) {
                let result = reconcile("anything", listings.clone(), at());

                prop_assert_eq!(result.listings().len(), listings.len());
                let ranked = result.listings();
                prop_assert!(ranked.windows(2).all(|pair| pair[0].price <= pair[1].price));
                prop_assert_eq!(result.best(), result.listings().first());
                let lowest = listings.iter().map(|listing| listing.price).min();
                prop_assert_eq!(result.best().map(|best| best.price), lowest);
            }

            #[test]
            fn average_is_the_two_place_mean(listings in listings()) {
                let result = reconcile("anything", listings.clone(), at());

                let total: Decimal = listings.iter().map(|listing| listing.price).sum();
                let expected = money(total / Decimal::from(listings.len()));
                prop_assert_eq!(result.average(), expected);
                prop_assert_eq!(result.average().scale(), 2);
            }

            #[test]
            fn platform_count_matches_distinct_platforms(listings in listings()) {
                let result = reconcile("anything", listings.clone(), at());

                let distinct: HashSet<&Platform> =
                    listings.iter().map(|listing| &listing.platform).collect();
                prop_assert_eq!(result.platform_count(), distinct.len());
            }

            #[test]
            fn input_order_and_repetition_do_not_change_the_result(
                (listings, shuffled) in listings().prop_flat_map(|listings| {
                    (Just(listings.clone()), Just(listings).prop_shuffle())
                })
            ) {
                let result = reconcile("anything", listings, at());

                prop_assert_eq!(&reconcile("anything", shuffled, at()), &result);
                prop_assert_eq!(&reconcile("anything", result.listings().to_vec(), at()), &result);
            }
        }
    }
}
