use serde::{Deserialize, Serialize};

/// Flat enhanced-cover uplift per policy year.
pub const ENHANCED_UPLIFT_PER_YEAR: i64 = 79;

/// Declared van uplift (79 + 20). Not applied: vans currently receive the flat
/// [`ENHANCED_UPLIFT_PER_YEAR`] like every other vehicle.
pub const VAN_ENHANCED_UPLIFT_PER_YEAR: i64 = 99;

/// Minimum saving on a three-year bundle.
pub const MIN_THREE_YEAR_SAVING: i64 = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundlePrices {
    pub two_year: i64,
    pub three_year: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingTier {
    pub one_year: i64,
    pub two_year: i64,
    pub three_year: i64,
    pub enhanced_one_year: i64,
    pub enhanced_two_year: i64,
    pub enhanced_three_year: i64,
}

impl PricingTier {
    /// Bundles and uplifts a one-year base price.
    pub fn from_one_year(one_year: i64) -> Self {
        let bundle = bundle_pricing(one_year);
        apply_enhanced(Self {
            one_year,
            two_year: bundle.two_year,
            three_year: bundle.three_year,
            enhanced_one_year: one_year,
            enhanced_two_year: bundle.two_year,
            enhanced_three_year: bundle.three_year,
        })
    }

    pub fn base_for_years(&self, years: u8) -> i64 {
        match years {
            2 => self.two_year,
            3 => self.three_year,
            _ => self.one_year,
        }
    }

    /// Applies `adjust` to every total, base and enhanced.
    pub fn map_totals(&self, adjust: impl Fn(i64) -> i64) -> Self {
        Self {
            one_year: adjust(self.one_year),
            two_year: adjust(self.two_year),
            three_year: adjust(self.three_year),
            enhanced_one_year: adjust(self.enhanced_one_year),
            enhanced_two_year: adjust(self.enhanced_two_year),
            enhanced_three_year: adjust(self.enhanced_three_year),
        }
    }
}

pub fn bundle_pricing(one_year: i64) -> BundlePrices {
    let two_year_saving = floor_percent(one_year, 15);
    let three_year_saving =
        MIN_THREE_YEAR_SAVING.max(two_year_saving.saturating_mul(2).saturating_sub(50));

    BundlePrices {
        two_year: one_year.saturating_mul(2).saturating_sub(two_year_saving),
        three_year: one_year.saturating_mul(3).saturating_sub(three_year_saving),
    }
}

/// Recomputes the enhanced totals from the base totals.
pub fn apply_enhanced(tier: PricingTier) -> PricingTier {
    PricingTier {
        enhanced_one_year: tier.one_year.saturating_add(ENHANCED_UPLIFT_PER_YEAR),
        enhanced_two_year: tier.two_year.saturating_add(ENHANCED_UPLIFT_PER_YEAR * 2),
        enhanced_three_year: tier.three_year.saturating_add(ENHANCED_UPLIFT_PER_YEAR * 3),
        ..tier
    }
}

/// `floor(amount * percent / 100)` in integers, so `349 * 0.15` floors to 52 exactly.
pub(crate) fn floor_percent(amount: i64, percent: i64) -> i64 {
    amount.saturating_mul(percent).div_euclid(100)
}

#[cfg(test)]
mod tests {
    use super::{apply_enhanced, bundle_pricing, PricingTier, ENHANCED_UPLIFT_PER_YEAR};
    use crate::pricing::tiers::BASE_PRICE_LADDER;

    #[test]
    fn bundles_the_entry_price() {
        let bundle = bundle_pricing(349);
        assert_eq!(bundle.two_year, 646);
        assert_eq!(bundle.three_year, 993);
    }

    #[test]
    fn three_year_saving_never_drops_below_fifty() {
        // saving on 100 is 15, so 2 * 15 - 50 < 50
        let bundle = bundle_pricing(100);
        assert_eq!(bundle.two_year, 185);
        assert_eq!(bundle.three_year, 250);

        // 849: saving 127, three-year saving 204
        let top = bundle_pricing(849);
        assert_eq!(top.two_year, 1571);
        assert_eq!(top.three_year, 2343);
    }

    #[test]
    fn bundles_are_cheaper_than_buying_years_separately() {
        for one_year in 7..5_000 {
            let bundle = bundle_pricing(one_year);
            assert!(bundle.two_year < 2 * one_year, "two-year bundle for {one_year}");
            assert!(bundle.three_year < 3 * one_year, "three-year bundle for {one_year}");
        }
    }

    #[test]
    fn oversized_prices_saturate_instead_of_wrapping() {
        let tier = PricingTier::from_one_year(i64::MAX);
        assert!(tier.two_year > 0 && tier.three_year > 0);
        assert_eq!(tier.enhanced_one_year, i64::MAX);
    }

    #[test]
    fn enhanced_adds_flat_uplift_per_year() {
        for price in BASE_PRICE_LADDER {
            let tier = PricingTier::from_one_year(i64::from(price));
            assert_eq!(tier.enhanced_one_year, tier.one_year + ENHANCED_UPLIFT_PER_YEAR);
            assert_eq!(tier.enhanced_two_year, tier.two_year + 2 * ENHANCED_UPLIFT_PER_YEAR);
            assert_eq!(tier.enhanced_three_year, tier.three_year + 3 * ENHANCED_UPLIFT_PER_YEAR);
        }
    }

    #[test]
    fn apply_enhanced_ignores_stale_enhanced_values() {
        let stale = PricingTier {
            one_year: 400,
            two_year: 740,
            three_year: 1070,
            enhanced_one_year: 0,
            enhanced_two_year: 0,
            enhanced_three_year: 0,
        };
        let enhanced = apply_enhanced(stale);
        assert_eq!(enhanced.enhanced_one_year, 479);
        assert_eq!(enhanced.enhanced_two_year, 898);
        assert_eq!(enhanced.enhanced_three_year, 1307);
        assert_eq!(apply_enhanced(enhanced), enhanced);
    }
}
