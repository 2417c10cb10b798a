use rust_decimal::Decimal;

use super::title::normalize_title;

/// Inclusive PKR range a listing price must fall in for its category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceBand {
    pub min: i64,
    pub max: i64,
}

impl PriceBand {
    const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, price: Decimal) -> bool {
        price >= Decimal::from(self.min) && price <= Decimal::from(self.max)
    }
}

pub const DEFAULT_BAND: PriceBand = PriceBand::new(1_000, 1_000_000);

// More specific keywords come first; the first keyword found in the title wins.
const CATEGORY_BANDS: &[(&str, PriceBand)] = &[
    ("apple watch", PriceBand::new(50_000, 300_000)),
    ("macbook", PriceBand::new(150_000, 1_000_000)),
    ("iphone", PriceBand::new(50_000, 500_000)),
    ("ipad", PriceBand::new(50_000, 500_000)),
    ("airpods", PriceBand::new(5_000, 100_000)),
    ("ps5", PriceBand::new(100_000, 300_000)),
    ("ps4", PriceBand::new(30_000, 150_000)),
    ("playstation", PriceBand::new(50_000, 300_000)),
    ("xbox", PriceBand::new(50_000, 300_000)),
    ("oneplus", PriceBand::new(40_000, 200_000)),
    ("redmi", PriceBand::new(15_000, 100_000)),
    ("realme", PriceBand::new(15_000, 100_000)),
    ("xiaomi", PriceBand::new(15_000, 150_000)),
    ("samsung", PriceBand::new(15_000, 400_000)),
    ("oppo", PriceBand::new(15_000, 150_000)),
    ("vivo", PriceBand::new(15_000, 150_000)),
    ("huawei", PriceBand::new(20_000, 200_000)),
    ("charger", PriceBand::new(500, 20_000)),
    ("cable", PriceBand::new(200, 10_000)),
    ("protector", PriceBand::new(200, 5_000)),
    ("case", PriceBand::new(300, 20_000)),
    ("cover", PriceBand::new(300, 20_000)),
    ("earbuds", PriceBand::new(1_000, 100_000)),
    ("headphones", PriceBand::new(1_000, 100_000)),
    ("speaker", PriceBand::new(2_000, 200_000)),
    ("watch", PriceBand::new(2_000, 500_000)),
    ("tablet", PriceBand::new(15_000, 300_000)),
    ("laptop", PriceBand::new(30_000, 1_000_000)),
    ("dell", PriceBand::new(30_000, 500_000)),
    ("hp", PriceBand::new(30_000, 500_000)),
    ("lenovo", PriceBand::new(30_000, 500_000)),
    ("asus", PriceBand::new(30_000, 500_000)),
    ("phone", PriceBand::new(10_000, 500_000)),
    ("mobile", PriceBand::new(10_000, 500_000)),
];

/// Band for the first category keyword appearing as a whole word (or word
/// sequence) in `title`, falling back to [`DEFAULT_BAND`].
pub fn band_for(title: &str) -> PriceBand {
    let padded = format!(" {} ", normalize_title(title));
    CATEGORY_BANDS
        .iter()
        .find(|(keyword, _)| padded.contains(&format!(" {keyword} ")))
        .map(|(_, band)| *band)
        .unwrap_or(DEFAULT_BAND)
}

pub fn is_plausible(title: &str, price: Decimal) -> bool {
    band_for(title).contains(price)
}
