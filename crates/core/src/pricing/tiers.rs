use crate::domain::vehicle::VehicleProfile;

/// Published one-year prices, cheapest first. Indexed by tier.
pub const BASE_PRICE_LADDER: [u32; 10] = [349, 399, 449, 499, 549, 599, 649, 699, 749, 849];

pub const MAX_TIER: u8 = 9;

const PREMIUM_BRAND_STEP: i32 = 2;
const VAN_STEP: i32 = 1;
const ELECTRIFIED_PREMIUM_STEP: i32 = 1;
const MOT_FAILURE_STEP: i32 = 1;
const RECENT_TEST_WINDOW: usize = 3;
const RECENT_FAILURE_THRESHOLD: usize = 2;
const NEW_REGISTRATION_YEAR: i32 = 2019;
const OLD_REGISTRATION_YEAR: i32 = 2013;
const YEAR_BAND_STEP: i32 = 2;

pub trait TierCalculator: Send + Sync {
    fn tier(&self, profile: &VehicleProfile, reference_year: i32) -> u8;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicTierCalculator;

impl TierCalculator for DeterministicTierCalculator {
    fn tier(&self, profile: &VehicleProfile, reference_year: i32) -> u8 {
        calculate_base_tier(profile, reference_year)
    }
}

/// Maps a vehicle onto [`BASE_PRICE_LADDER`]. The index is clamped after every step.
pub fn calculate_base_tier(profile: &VehicleProfile, reference_year: i32) -> u8 {
    // floor(age * 1.5) without leaving integer arithmetic
    let age_steps = profile.age(reference_year).saturating_mul(3) / 2;
    let mut index = clamp_tier(9_i32.saturating_sub(i32::try_from(age_steps).unwrap_or(i32::MAX)));

    if profile.is_premium_brand {
        index = clamp_tier(index + PREMIUM_BRAND_STEP);
    }
    if profile.is_van {
        index = clamp_tier(index + VAN_STEP);
    }
    if (profile.is_ev || profile.is_phev) && profile.is_premium_brand {
        index = clamp_tier(index + ELECTRIFIED_PREMIUM_STEP);
    }
    if has_repeated_recent_failures(profile) {
        index = clamp_tier(index + MOT_FAILURE_STEP);
    }

    if profile.manufacture_year >= NEW_REGISTRATION_YEAR {
        index = clamp_tier(index - YEAR_BAND_STEP);
    } else if profile.manufacture_year <= OLD_REGISTRATION_YEAR {
        index = clamp_tier(index + YEAR_BAND_STEP);
    }

    u8::try_from(index).unwrap_or(MAX_TIER)
}

pub fn base_price_for_tier(tier: u8) -> u32 {
    BASE_PRICE_LADDER[usize::from(tier.min(MAX_TIER))]
}

fn has_repeated_recent_failures(profile: &VehicleProfile) -> bool {
    profile.recent_tests(RECENT_TEST_WINDOW).iter().filter(|test| test.failed()).count()
        >= RECENT_FAILURE_THRESHOLD
}

fn clamp_tier(index: i32) -> i32 {
    index.clamp(0, i32::from(MAX_TIER))
}
