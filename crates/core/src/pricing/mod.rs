pub mod addons;
pub mod bundle;
pub mod eligibility;
pub mod payment;
pub mod tiers;

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::domain::vehicle::VehicleInput;
use crate::errors::DomainError;
use crate::reliability::{score_reliability, ReliabilityResult};

use self::{
    addons::{add_on_quote, parse_selections, AddOnQuote, PaymentTerm},
    bundle::PricingTier,
    eligibility::{
        DeterministicEligibilityFilter, EligibilityFilter, EligibilityInput, EligibilityResult,
    },
    payment::{apply_payment_discount, calculate_monthly_payment, PaymentMethod},
    tiers::{base_price_for_tier, DeterministicTierCalculator, TierCalculator},
};

pub const QUOTE_CURRENCY: &str = "GBP";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub vehicle: VehicleInput,
    #[serde(default)]
    pub payment_term: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub add_ons: BTreeMap<String, bool>,
    /// Months the add-ons run for; defaults to the payment term length.
    #[serde(default)]
    pub duration_months: Option<u32>,
    #[serde(default)]
    pub current_mileage: Option<u32>,
    #[serde(default)]
    pub manufacture_date: Option<NaiveDate>,
}

impl QuoteRequest {
    pub fn term(&self) -> PaymentTerm {
        self.payment_term.as_deref().map(PaymentTerm::normalize).unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTrace {
    pub currency: String,
    pub steps: Vec<PricingTraceStep>,
}

impl PricingTrace {
    fn record(&mut self, stage: &str, detail: impl Into<String>, amount: impl Into<Decimal>) {
        self.steps.push(PricingTraceStep {
            stage: stage.to_string(),
            detail: detail.into(),
            amount: amount.into(),
        });
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyInstallments {
    pub one_year: Decimal,
    pub two_year: Decimal,
    pub three_year: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceMatrix {
    pub tier: u8,
    pub base_annual_price: i64,
    /// Bundled and enhanced totals before any payment discount.
    pub list: PricingTier,
    pub payment_method: PaymentMethod,
    /// `list` with the payment-method discount applied.
    pub payable: PricingTier,
    pub monthly_installments: MonthlyInstallments,
    pub term: PaymentTerm,
    pub add_ons: AddOnQuote,
    pub reliability: Option<ReliabilityResult>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteOutcome {
    pub fingerprint: String,
    pub eligibility: EligibilityResult,
    pub matrix: Option<PriceMatrix>,
    pub trace: PricingTrace,
}

pub trait QuoteRuntime: Send + Sync {
    fn quote(&self, request: &QuoteRequest, as_of: NaiveDate) -> Result<QuoteOutcome, DomainError>;
}

pub struct DeterministicQuoteRuntime<E, T> {
    eligibility_filter: E,
    tier_calculator: T,
}

impl<E, T> DeterministicQuoteRuntime<E, T> {
    pub fn new(eligibility_filter: E, tier_calculator: T) -> Self {
        Self { eligibility_filter, tier_calculator }
    }
}

impl Default for DeterministicQuoteRuntime<DeterministicEligibilityFilter, DeterministicTierCalculator> {
    fn default() -> Self {
        Self::new(DeterministicEligibilityFilter::default(), DeterministicTierCalculator)
    }
}

impl<E, T> QuoteRuntime for DeterministicQuoteRuntime<E, T>
where
    E: EligibilityFilter,
    T: TierCalculator,
{
    fn quote(&self, request: &QuoteRequest, as_of: NaiveDate) -> Result<QuoteOutcome, DomainError> {
        let fingerprint = quote_fingerprint(request, as_of);
        let reference_year = as_of.year();
        let vehicle = &request.vehicle;
        let mut trace = PricingTrace { currency: QUOTE_CURRENCY.to_string(), steps: Vec::new() };

        let eligibility = self.eligibility_filter.check(&EligibilityInput {
            make: &vehicle.make,
            model: &vehicle.model,
            manufacture_year: vehicle.manufacture_year,
            mot_history: Some(vehicle.mot_history.as_slice()),
            reference_year,
        });
        if eligibility.blocked {
            debug!(
                event_name = "pricing.quote.ineligible",
                fingerprint = %fingerprint,
                rule = ?eligibility.rule,
                "vehicle failed eligibility"
            );
            trace.record(
                "eligibility",
                eligibility.reason.clone().unwrap_or_else(|| "blocked".to_string()),
                Decimal::ZERO,
            );
            return Ok(QuoteOutcome { fingerprint, eligibility, matrix: None, trace });
        }

        let profile = vehicle.to_profile().ok_or_else(|| DomainError::UnknownManufactureYear {
            make: vehicle.make.clone(),
            model: vehicle.model.clone(),
        })?;

        let tier = self.tier_calculator.tier(&profile, reference_year);
        let base_annual_price = i64::from(base_price_for_tier(tier));
        trace.record("base_tier", format!("tier {tier} of ladder"), base_annual_price);

        let list = PricingTier::from_one_year(base_annual_price);
        trace.record("bundle", "two-year total after 15% saving", list.two_year);
        trace.record("bundle", "three-year total after bundle saving", list.three_year);
        trace.record("enhanced", "one-year total with enhanced uplift", list.enhanced_one_year);

        let payable = list.map_totals(|total| apply_payment_discount(total, request.payment_method));
        trace.record(
            "payment_discount",
            format!("{:?} payment applied to one-year total", request.payment_method),
            payable.one_year,
        );

        let monthly_installments = MonthlyInstallments {
            one_year: installment(&payable, 1),
            two_year: installment(&payable, 2),
            three_year: installment(&payable, 3),
        };

        let term = request.term();
        let duration_months = request.duration_months.unwrap_or_else(|| term.months());
        let add_ons = add_on_quote(&parse_selections(&request.add_ons), term, duration_months);
        trace.record("add_ons", format!("{} selected for {term}", add_ons.lines.len()), add_ons.total);

        let reliability = (!profile.mot_history.is_empty()).then(|| {
            score_reliability(
                &profile.mot_history,
                request.manufacture_date,
                request.current_mileage,
                as_of,
            )
        });

        Ok(QuoteOutcome {
            fingerprint,
            eligibility,
            matrix: Some(PriceMatrix {
                tier,
                base_annual_price,
                list,
                payment_method: request.payment_method,
                payable,
                monthly_installments,
                term,
                add_ons,
                reliability,
            }),
            trace,
        })
    }
}

/// Stable `sha256:` digest of the request and pricing date. Identical inputs always
/// produce the same digest, so it doubles as a quote cache key.
pub fn quote_fingerprint(request: &QuoteRequest, as_of: NaiveDate) -> String {
    let canonical = serde_json::to_vec(&(request, as_of.to_string())).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    format!("sha256:{:x}", hasher.finalize())
}

fn installment(payable: &PricingTier, years: u8) -> Decimal {
    let annual = Decimal::from(payable.base_for_years(years)) / Decimal::from(years);
    calculate_monthly_payment(annual, u32::from(years))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{
        eligibility::{EligibilityFilter, EligibilityInput, EligibilityResult},
        tiers::TierCalculator,
        DeterministicQuoteRuntime, QuoteRequest, QuoteRuntime,
    };
    use crate::domain::vehicle::{FuelType, VehicleInput, VehicleProfile};
    use crate::errors::DomainError;
    use crate::pricing::payment::PaymentMethod;
    use crate::pricing::tiers::DeterministicTierCalculator;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).expect("valid date")
    }

    fn request(make: &str, model: &str, year: Option<i32>) -> QuoteRequest {
        QuoteRequest {
            vehicle: VehicleInput {
                make: make.to_string(),
                model: model.to_string(),
                manufacture_year: year,
                fuel_type: FuelType::Petrol,
                body_type: None,
                engine_capacity: None,
                is_phev: false,
                mot_history: Vec::new(),
            },
            payment_term: Some("24months".to_string()),
            payment_method: PaymentMethod::Full,
            add_ons: BTreeMap::from([
                ("breakdown".to_string(), true),
                ("tyre".to_string(), true),
            ]),
            duration_months: None,
            current_mileage: None,
            manufacture_date: None,
        }
    }

    #[test]
    fn quotes_an_eligible_vehicle_end_to_end() {
        let runtime = DeterministicQuoteRuntime::default();
        // Vauxhall Astra 2016 lands on tier 0 (349)
        let outcome =
            runtime.quote(&request("Vauxhall", "Astra", Some(2016)), as_of()).expect("quote");

        assert!(!outcome.eligibility.blocked);
        let matrix = outcome.matrix.expect("eligible vehicles are priced");
        assert_eq!(matrix.tier, 0);
        assert_eq!(matrix.base_annual_price, 349);
        assert_eq!(matrix.list.two_year, 646);
        assert_eq!(matrix.list.three_year, 993);
        assert_eq!(matrix.list.enhanced_one_year, 428);
        assert_eq!(matrix.payable.one_year, 314);
        assert_eq!(matrix.payable.two_year, 581);
        // 314 / 12 = 26.17 => 27
        assert_eq!(matrix.monthly_installments.one_year, Decimal::from(27));
        // breakdown free at 24 months, tyre 7.99 * 24
        assert_eq!(matrix.add_ons.total, Decimal::new(19176, 2));
        assert!(matrix.reliability.is_none());
        assert!(outcome.trace.steps.iter().any(|step| step.stage == "payment_discount"));
    }

    #[test]
    fn blocked_vehicle_returns_reason_without_prices() {
        let runtime = DeterministicQuoteRuntime::default();
        let outcome =
            runtime.quote(&request("Ferrari", "488", Some(2020)), as_of()).expect("quote");

        assert!(outcome.eligibility.blocked);
        assert!(outcome.matrix.is_none());
        assert_eq!(outcome.trace.steps.len(), 1);
    }

    #[test]
    fn extreme_manufacture_years_never_price_as_new() {
        let runtime = DeterministicQuoteRuntime::default();
        for year in [i32::MIN, -800_000_000] {
            let outcome =
                runtime.quote(&request("Ford", "Focus", Some(year)), as_of()).expect("quote");
            assert!(outcome.eligibility.blocked, "year {year} should be blocked");
            assert!(outcome.matrix.is_none());
        }

        let future = runtime.quote(&request("Ford", "Focus", Some(i32::MAX)), as_of()).expect("quote");
        assert!(future.matrix.is_some());
    }

    #[test]
    fn missing_manufacture_year_is_a_domain_error() {
        let runtime = DeterministicQuoteRuntime::default();
        let result = runtime.quote(&request("Ford", "Focus", None), as_of());
        assert!(matches!(result, Err(DomainError::UnknownManufactureYear { .. })));
    }

    #[test]
    fn identical_requests_produce_identical_outcomes() {
        let runtime = DeterministicQuoteRuntime::default();
        let request = request("Audi", "A4 Avant", Some(2021));

        let first = runtime.quote(&request, as_of()).expect("first quote");
        let second = runtime.quote(&request, as_of()).expect("second quote");
        assert_eq!(first, second);
        assert!(first.fingerprint.starts_with("sha256:"));

        let later = runtime
            .quote(&request, NaiveDate::from_ymd_opt(2027, 1, 1).expect("date"))
            .expect("later quote");
        assert_ne!(first.fingerprint, later.fingerprint);
    }

    #[test]
    fn runtime_supports_explicit_engine_interfaces() {
        struct AllowEverything;

        impl EligibilityFilter for AllowEverything {
            fn check(&self, _input: &EligibilityInput<'_>) -> EligibilityResult {
                EligibilityResult::eligible()
            }
        }

        struct TopTier;

        impl TierCalculator for TopTier {
            fn tier(&self, _profile: &VehicleProfile, _reference_year: i32) -> u8 {
                9
            }
        }

        let runtime = DeterministicQuoteRuntime::new(AllowEverything, TopTier);
        let outcome = runtime.quote(&request("Ferrari", "488", Some(2020)), as_of()).expect("quote");
        let matrix = outcome.matrix.expect("filter allowed the vehicle");
        assert_eq!(matrix.base_annual_price, 849);

        let mixed = DeterministicQuoteRuntime::new(AllowEverything, DeterministicTierCalculator);
        assert!(mixed.quote(&request("Ferrari", "488", Some(2020)), as_of()).is_ok());
    }
}
