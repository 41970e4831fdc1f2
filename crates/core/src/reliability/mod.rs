//! MOT-history reliability scoring.
//!
//! Converts a vehicle's MOT test record into a 0–100 score, a discrete tier from 1 (best)
//! to 7 and that tier's fixed 12/24/36-month price table. This is an alternative pricing
//! strategy to the base ladder and shares no state with it.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::mot::{infer_manufacture_year, MotTestRecord};

/// Score reported for vehicles with no MOT history yet.
pub const NO_HISTORY_SCORE: u8 = 98;

const FAILURE_RATE_WEIGHT: f64 = 0.4;
const CRITICAL_FAILURE_WEIGHT: f64 = 5.0;
const MILEAGE_WEIGHT_PER_THOUSAND: f64 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPricing {
    #[serde(rename = "12")]
    pub twelve_months: u32,
    #[serde(rename = "24")]
    pub twenty_four_months: u32,
    #[serde(rename = "36")]
    pub thirty_six_months: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReliabilityTier {
    pub tier: u8,
    pub min_score: u8,
    pub label: &'static str,
    pub pricing: TierPricing,
}

/// Tier breakpoints and published prices, best tier first.
pub const RELIABILITY_TIERS: [ReliabilityTier; 7] = [
    ReliabilityTier {
        tier: 1,
        min_score: 95,
        label: "Exceptional Reliability",
        pricing: TierPricing { twelve_months: 349, twenty_four_months: 599, thirty_six_months: 849 },
    },
    ReliabilityTier {
        tier: 2,
        min_score: 90,
        label: "Excellent Reliability",
        pricing: TierPricing { twelve_months: 399, twenty_four_months: 699, thirty_six_months: 979 },
    },
    ReliabilityTier {
        tier: 3,
        min_score: 85,
        label: "Very Good Reliability",
        pricing: TierPricing {
            twelve_months: 449,
            twenty_four_months: 789,
            thirty_six_months: 1099,
        },
    },
    ReliabilityTier {
        tier: 4,
        min_score: 80,
        label: "Good Reliability",
        pricing: TierPricing {
            twelve_months: 499,
            twenty_four_months: 879,
            thirty_six_months: 1229,
        },
    },
    ReliabilityTier {
        tier: 5,
        min_score: 70,
        label: "Average Reliability",
        pricing: TierPricing {
            twelve_months: 579,
            twenty_four_months: 1019,
            thirty_six_months: 1429,
        },
    },
    ReliabilityTier {
        tier: 6,
        min_score: 60,
        label: "Below Average Reliability",
        pricing: TierPricing {
            twelve_months: 679,
            twenty_four_months: 1199,
            thirty_six_months: 1679,
        },
    },
    ReliabilityTier {
        tier: 7,
        min_score: 0,
        label: "Poor Reliability",
        pricing: TierPricing {
            twelve_months: 799,
            twenty_four_months: 1399,
            thirty_six_months: 1959,
        },
    },
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReliabilityResult {
    pub score: u8,
    pub tier: u8,
    pub tier_label: String,
    pub failure_rate: f64,
    pub critical_failures: u32,
    pub mileage_factor: u32,
    pub pricing: TierPricing,
}

pub fn tier_for_score(score: u8) -> &'static ReliabilityTier {
    let index = RELIABILITY_TIERS
        .iter()
        .position(|tier| score >= tier.min_score)
        .unwrap_or(RELIABILITY_TIERS.len() - 1);
    &RELIABILITY_TIERS[index]
}

/// Scores MOT history as of `as_of`. Tests may be in any order.
pub fn score_reliability(
    mot_tests: &[MotTestRecord],
    manufacture_date: Option<NaiveDate>,
    current_mileage: Option<u32>,
    as_of: NaiveDate,
) -> ReliabilityResult {
    if mot_tests.is_empty() {
        return result_for(NO_HISTORY_SCORE, 0.0, 0, 0.0);
    }

    let total = mot_tests.len() as f64;
    let failed = mot_tests.iter().filter(|test| test.failed()).count() as f64;
    let failure_rate = failed / total * 100.0;

    let critical_failures = mot_tests
        .iter()
        .flat_map(|test| test.defects.iter())
        .filter(|defect| defect.is_critical())
        .count();
    let critical_failures = u32::try_from(critical_failures).unwrap_or(u32::MAX);

    let mileage_factor = miles_per_year(mot_tests, manufacture_date, current_mileage, as_of);

    let raw_score = 100.0
        - (failure_rate * FAILURE_RATE_WEIGHT
            + f64::from(critical_failures) * CRITICAL_FAILURE_WEIGHT
            + (mileage_factor / 1000.0) * MILEAGE_WEIGHT_PER_THOUSAND);
    let score = raw_score.clamp(0.0, 100.0).round() as u8;

    result_for(score, failure_rate, critical_failures, mileage_factor)
}

fn result_for(
    score: u8,
    failure_rate: f64,
    critical_failures: u32,
    mileage_factor: f64,
) -> ReliabilityResult {
    let tier = tier_for_score(score);
    ReliabilityResult {
        score,
        tier: tier.tier,
        tier_label: tier.label.to_string(),
        failure_rate,
        critical_failures,
        mileage_factor: mileage_factor.round() as u32,
        pricing: tier.pricing,
    }
}

/// Prefers the customer's stated mileage over the vehicle's age; otherwise uses the latest
/// MOT odometer reading over the years between manufacture and that test.
fn miles_per_year(
    mot_tests: &[MotTestRecord],
    manufacture_date: Option<NaiveDate>,
    current_mileage: Option<u32>,
    as_of: NaiveDate,
) -> f64 {
    if let (Some(manufactured), Some(mileage)) = (manufacture_date, current_mileage) {
        let age_years = (as_of - manufactured).num_days() as f64 / 365.25;
        return f64::from(mileage) / age_years.max(1.0);
    }

    let Some(latest) = mot_tests.iter().max_by_key(|test| test.completed_date) else {
        return 0.0;
    };
    let Some(miles) = latest.odometer_miles() else {
        return 0.0;
    };

    let manufacture_year = manufacture_date
        .map(|date| date.year())
        .or_else(|| infer_manufacture_year(mot_tests))
        .unwrap_or(latest.year());
    let years = (latest.year() - manufacture_year).max(1);

    miles / f64::from(years)
}
