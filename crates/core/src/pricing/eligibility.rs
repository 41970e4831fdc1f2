use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::mot::{infer_manufacture_year, MotTestRecord};
use crate::domain::vehicle::normalize_vehicle_name;

/// Vehicles older than this many whole years cannot be covered.
pub const MAX_VEHICLE_AGE_YEARS: i32 = 12;

/// Makes that are never covered, whatever the model.
pub const BLOCKED_BRANDS: &[&str] = &[
    "aston martin",
    "bentley",
    "bugatti",
    "ferrari",
    "koenigsegg",
    "lamborghini",
    "lotus",
    "maserati",
    "maybach",
    "mclaren",
    "pagani",
    "rolls-royce",
];

/// Per-make model fragments. A model is blocked when it equals a fragment or either
/// contains the other, so `rs3` also catches `rs3 sportback`.
pub const BLOCKED_MODELS: &[(&str, &[&str])] = &[
    ("alpine", &["a110"]),
    ("audi", &["r8", "rs3", "rs4", "rs5", "rs6", "rs7", "rs q3", "rs q8", "tt rs", "e-tron gt"]),
    ("bmw", &["m2", "m3", "m4", "m5", "m6", "m8", "x3 m", "x4 m", "x5 m", "x6 m", "i8", "z8"]),
    ("cupra", &["leon vz2", "formentor vz5"]),
    ("honda", &["nsx", "civic type r", "s2000"]),
    ("jaguar", &["f-type", "xkr", "xfr", "project 7"]),
    ("land rover", &["range rover sport svr", "defender octa"]),
    (
        "mercedes",
        &["amg gt", "sls", "slr", "c63", "e63", "s63", "s65", "g63", "g65", "cla45", "a45"],
    ),
    ("nissan", &["gt-r", "gtr", "370z nismo"]),
    ("porsche", &["911", "918", "carrera", "taycan", "cayman gt4", "boxster spyder"]),
    ("tesla", &["model s plaid", "roadster"]),
    ("volkswagen", &["golf r"]),
];

/// Exact `MAKE MODEL` names blocked independently of the brand and model lists.
pub const HIGH_PERFORMANCE_MODELS: &[&str] = &[
    "AUDI RS6 AVANT PERFORMANCE",
    "BMW M3 COMPETITION SEDAN",
    "BMW M4 CSL",
    "FORD FOCUS RS",
    "FORD FIESTA ST PERFORMANCE EDITION",
    "FORD MUSTANG SHELBY GT500",
    "HONDA CIVIC TYPE R",
    "HYUNDAI I30 N",
    "MERCEDES-BENZ AMG GT BLACK SERIES",
    "MITSUBISHI LANCER EVOLUTION X",
    "NISSAN GT-R NISMO",
    "PORSCHE 911 GT3 RS",
    "RENAULT MEGANE RS TROPHY-R",
    "SUBARU WRX STI",
    "TOYOTA GR YARIS",
    "VOLKSWAGEN GOLF R",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockRule {
    Brand,
    Model,
    HighPerformance,
    Age,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub blocked: bool,
    pub reason: Option<String>,
    pub rule: Option<BlockRule>,
}

impl EligibilityResult {
    pub fn eligible() -> Self {
        Self { blocked: false, reason: None, rule: None }
    }

    pub fn blocked(rule: BlockRule, reason: impl Into<String>) -> Self {
        Self { blocked: true, reason: Some(reason.into()), rule: Some(rule) }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct EligibilityInput<'a> {
    pub make: &'a str,
    pub model: &'a str,
    pub manufacture_year: Option<i32>,
    pub mot_history: Option<&'a [MotTestRecord]>,
    pub reference_year: i32,
}

/// A single filter stage. `None` means the stage has no objection.
pub trait EligibilityStage: Send + Sync {
    fn check(&self, input: &EligibilityInput<'_>) -> Option<EligibilityResult>;
}

pub trait EligibilityFilter: Send + Sync {
    fn check(&self, input: &EligibilityInput<'_>) -> EligibilityResult;
}

/// Brand and model blocklists with normalized containment matching.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlocklistStage;

impl EligibilityStage for BlocklistStage {
    fn check(&self, input: &EligibilityInput<'_>) -> Option<EligibilityResult> {
        let make = normalize_vehicle_name(input.make);
        let model = normalize_vehicle_name(input.model);

        if BLOCKED_BRANDS.contains(&make.as_str()) {
            return Some(EligibilityResult::blocked(
                BlockRule::Brand,
                format!(
                    "We're unable to offer warranty cover for {} vehicles.",
                    display_name(input.make)
                ),
            ));
        }

        if model.is_empty() {
            return None;
        }

        let blocked_models = BLOCKED_MODELS
            .iter()
            .find(|(brand, _)| *brand == make)
            .map(|(_, models)| *models)
            .unwrap_or_default();

        blocked_models
            .iter()
            .find(|blocked| model_matches(&model, blocked))
            .map(|blocked| {
                debug!(
                    event_name = "pricing.eligibility.model_blocked",
                    make = %make,
                    model = %model,
                    matched = %blocked,
                    "model matched blocklist entry"
                );
                EligibilityResult::blocked(
                    BlockRule::Model,
                    format!(
                        "We're unable to offer warranty cover for the {} {} as it is a high-performance model.",
                        display_name(input.make),
                        display_name(input.model)
                    ),
                )
            })
    }
}

/// Exact full-name match against the high-performance list.
#[derive(Clone, Copy, Debug, Default)]
pub struct HighPerformanceStage;

impl EligibilityStage for HighPerformanceStage {
    fn check(&self, input: &EligibilityInput<'_>) -> Option<EligibilityResult> {
        is_high_performance_model(input.make, input.model).then(|| {
            EligibilityResult::blocked(
                BlockRule::HighPerformance,
                format!(
                    "The {} {} is classed as a high-performance vehicle and cannot be covered.",
                    display_name(input.make),
                    display_name(input.model)
                ),
            )
        })
    }
}

/// Rejects vehicles older than [`MAX_VEHICLE_AGE_YEARS`].
#[derive(Clone, Copy, Debug, Default)]
pub struct AgeStage;

impl EligibilityStage for AgeStage {
    fn check(&self, input: &EligibilityInput<'_>) -> Option<EligibilityResult> {
        let year = input
            .manufacture_year
            .or_else(|| input.mot_history.and_then(infer_manufacture_year))?;
        let age = input.reference_year.saturating_sub(year);

        (age > MAX_VEHICLE_AGE_YEARS).then(|| {
            EligibilityResult::blocked(
                BlockRule::Age,
                format!(
                    "Vehicles over {MAX_VEHICLE_AGE_YEARS} years old are not eligible for cover."
                ),
            )
        })
    }
}

/// Runs blocklist, high-performance and age stages in order; the first block wins.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicEligibilityFilter {
    blocklist: BlocklistStage,
    high_performance: HighPerformanceStage,
    age: AgeStage,
}

impl EligibilityFilter for DeterministicEligibilityFilter {
    fn check(&self, input: &EligibilityInput<'_>) -> EligibilityResult {
        let stages: [&dyn EligibilityStage; 3] = [&self.blocklist, &self.high_performance, &self.age];
        stages.iter().find_map(|stage| stage.check(input)).unwrap_or_else(EligibilityResult::eligible)
    }
}

pub fn check_eligibility(
    make: &str,
    model: &str,
    manufacture_year: Option<i32>,
    mot_history: Option<&[MotTestRecord]>,
    reference_year: i32,
) -> EligibilityResult {
    DeterministicEligibilityFilter::default().check(&EligibilityInput {
        make,
        model,
        manufacture_year,
        mot_history,
        reference_year,
    })
}

pub fn is_high_performance_model(make: &str, model: &str) -> bool {
    let full_name = format!("{} {}", make.trim(), model.trim()).to_uppercase();
    HIGH_PERFORMANCE_MODELS.iter().any(|name| *name == full_name)
}

fn model_matches(model: &str, blocked: &str) -> bool {
    model == blocked || model.contains(blocked) || blocked.contains(model)
}

fn display_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{
        check_eligibility, is_high_performance_model, AgeStage, BlockRule, BlocklistStage,
        EligibilityInput, EligibilityStage, HighPerformanceStage, BLOCKED_BRANDS,
    };
    use crate::domain::mot::{MotTestRecord, OdometerUnit, TestResult};

    const YEAR: i32 = 2026;

    fn input<'a>(make: &'a str, model: &'a str, year: i32) -> EligibilityInput<'a> {
        EligibilityInput {
            make,
            model,
            manufacture_year: Some(year),
            mot_history: None,
            reference_year: YEAR,
        }
    }

    #[test]
    fn exotic_brand_is_blocked_for_any_model() {
        let result = check_eligibility("Ferrari", "488", Some(2020), None, YEAR);
        assert!(result.blocked);
        assert_eq!(result.rule, Some(BlockRule::Brand));
        assert!(result.reason.as_deref().is_some_and(|reason| reason.contains("Ferrari")));

        for brand in BLOCKED_BRANDS {
            let result = check_eligibility(brand, "", Some(2022), None, YEAR);
            assert!(result.blocked, "{brand} should be blocked with an empty model");
        }
    }

    #[test]
    fn model_blocklist_matches_by_containment() {
        let result = check_eligibility("Audi", "RS3 Sportback", Some(2021), None, YEAR);
        assert!(result.blocked);
        assert_eq!(result.rule, Some(BlockRule::Model));

        let reverse = check_eligibility("Nissan", "GT", Some(2021), None, YEAR);
        assert!(reverse.blocked, "`gt` is contained in `gt-r`");

        let folded = check_eligibility("MERCEDES-BENZ", "C63 AMG", Some(2020), None, YEAR);
        assert!(folded.blocked);

        let allowed = check_eligibility("Audi", "A3 Sportback", Some(2021), None, YEAR);
        assert!(!allowed.blocked);
        assert_eq!(allowed.reason, None);
    }

    #[test]
    fn empty_model_only_blocks_at_brand_level() {
        assert!(BlocklistStage.check(&input("Audi", "  ", 2021)).is_none());
        assert!(BlocklistStage.check(&input("Bentley", "", 2021)).is_some());
    }

    #[test]
    fn high_performance_stage_blocks_exact_names_missed_by_blocklist() {
        assert!(BlocklistStage.check(&input("Toyota", "GR Yaris", 2022)).is_none());
        assert!(HighPerformanceStage.check(&input("Toyota", "GR Yaris", 2022)).is_some());

        let result = check_eligibility(" toyota ", "gr yaris ", Some(2022), None, YEAR);
        assert!(result.blocked);
        assert_eq!(result.rule, Some(BlockRule::HighPerformance));

        assert!(is_high_performance_model("BMW", "M3 Competition Sedan"));
        assert!(!is_high_performance_model("BMW", "M3 Competition"));
        assert!(!is_high_performance_model("Toyota", "Yaris"));
    }

    #[test]
    fn age_boundary_allows_twelve_and_blocks_thirteen() {
        assert!(!check_eligibility("Ford", "Focus", Some(YEAR - 12), None, YEAR).blocked);

        let old = check_eligibility("Ford", "Focus", Some(YEAR - 13), None, YEAR);
        assert!(old.blocked);
        assert_eq!(old.rule, Some(BlockRule::Age));
    }

    #[test]
    fn any_vehicle_older_than_twelve_years_is_blocked() {
        for age in 13..40 {
            for (make, model) in [("Ford", "Fiesta"), ("Toyota", "Corolla"), ("Audi", "A4")] {
                assert!(check_eligibility(make, model, Some(YEAR - age), None, YEAR).blocked);
            }
        }
    }

    #[test]
    fn extreme_manufacture_years_resolve_without_overflow() {
        for year in [i32::MIN, -800_000_000] {
            let result = check_eligibility("Ford", "Focus", Some(year), None, YEAR);
            assert!(result.blocked, "year {year} should be blocked");
            assert_eq!(result.rule, Some(BlockRule::Age));
        }
        assert!(!check_eligibility("Ford", "Focus", Some(i32::MAX), None, YEAR).blocked);
    }

    #[test]
    fn age_falls_back_to_mot_history_and_skips_when_unknown() {
        let history = vec![MotTestRecord {
            completed_date: NaiveDate::from_ymd_opt(2012, 5, 1).expect("date"),
            test_result: TestResult::Passed,
            expiry_date: None,
            odometer_value: None,
            odometer_unit: OdometerUnit::Miles,
            defects: Vec::new(),
        }];

        let inferred = EligibilityInput {
            manufacture_year: None,
            mot_history: Some(history.as_slice()),
            ..input("Ford", "Focus", 0)
        };
        assert!(AgeStage.check(&inferred).is_some(), "2009 registration is 17 years old");

        let unknown = EligibilityInput { manufacture_year: None, ..input("Ford", "Focus", 0) };
        assert!(AgeStage.check(&unknown).is_none());
    }

    #[test]
    fn repeated_checks_are_identical() {
        let first = check_eligibility("BMW", "M340i", Some(2020), None, YEAR);
        let second = check_eligibility("BMW", "M340i", Some(2020), None, YEAR);
        assert_eq!(first, second);
    }
}
