use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::vehicle::FuelType;

/// Kilometres to miles, as used when an MOT odometer reading is recorded in km.
pub const KM_TO_MILES: f64 = 0.621371;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TestResult {
    Passed,
    Failed,
}

impl From<String> for TestResult {
    fn from(value: String) -> Self {
        if value.trim().to_ascii_lowercase().starts_with("pass") {
            Self::Passed
        } else {
            Self::Failed
        }
    }
}

impl From<TestResult> for String {
    fn from(value: TestResult) -> Self {
        match value {
            TestResult::Passed => "PASSED".to_string(),
            TestResult::Failed => "FAILED".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OdometerUnit {
    #[default]
    Miles,
    Kilometres,
}

impl From<String> for OdometerUnit {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "km" | "kms" | "kilometres" | "kilometers" => Self::Kilometres,
            _ => Self::Miles,
        }
    }
}

impl From<OdometerUnit> for String {
    fn from(value: OdometerUnit) -> Self {
        match value {
            OdometerUnit::Miles => "mi".to_string(),
            OdometerUnit::Kilometres => "km".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DefectType {
    Advisory,
    Minor,
    Major,
    Dangerous,
    Prs,
    Fail,
    UserEntered,
    Other,
}

impl DefectType {
    pub fn is_critical(self) -> bool {
        matches!(self, Self::Major | Self::Dangerous)
    }
}

impl From<String> for DefectType {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_uppercase().replace('_', " ").as_str() {
            "ADVISORY" => Self::Advisory,
            "MINOR" => Self::Minor,
            "MAJOR" => Self::Major,
            "DANGEROUS" => Self::Dangerous,
            "PRS" => Self::Prs,
            "FAIL" => Self::Fail,
            "USER ENTERED" => Self::UserEntered,
            _ => Self::Other,
        }
    }
}

impl From<DefectType> for String {
    fn from(value: DefectType) -> Self {
        match value {
            DefectType::Advisory => "ADVISORY",
            DefectType::Minor => "MINOR",
            DefectType::Major => "MAJOR",
            DefectType::Dangerous => "DANGEROUS",
            DefectType::Prs => "PRS",
            DefectType::Fail => "FAIL",
            DefectType::UserEntered => "USER ENTERED",
            DefectType::Other => "OTHER",
        }
        .to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defect {
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type")]
    pub kind: DefectType,
    #[serde(default)]
    pub dangerous: bool,
}

impl Defect {
    pub fn is_critical(&self) -> bool {
        self.dangerous || self.kind.is_critical()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotTestRecord {
    #[serde(deserialize_with = "de_date", serialize_with = "ser_date")]
    pub completed_date: NaiveDate,
    pub test_result: TestResult,
    #[serde(default, deserialize_with = "de_opt_date", serialize_with = "ser_opt_date")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "de_opt_odometer")]
    pub odometer_value: Option<u32>,
    #[serde(default)]
    pub odometer_unit: OdometerUnit,
    #[serde(default)]
    pub defects: Vec<Defect>,
}

impl MotTestRecord {
    pub fn failed(&self) -> bool {
        self.test_result == TestResult::Failed
    }

    pub fn odometer_miles(&self) -> Option<f64> {
        self.odometer_value.map(|value| match self.odometer_unit {
            OdometerUnit::Miles => f64::from(value),
            OdometerUnit::Kilometres => f64::from(value) * KM_TO_MILES,
        })
    }

    pub fn year(&self) -> i32 {
        self.completed_date.year()
    }
}

/// Vehicle as returned by the MOT history service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRecord {
    #[serde(default)]
    pub registration: String,
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default, deserialize_with = "de_opt_date", serialize_with = "ser_opt_date")]
    pub manufacture_date: Option<NaiveDate>,
    #[serde(default)]
    pub fuel_type: FuelType,
    #[serde(default)]
    pub mot_tests: Vec<MotTestRecord>,
}

impl VehicleRecord {
    pub fn manufacture_year(&self) -> Option<i32> {
        self.manufacture_date
            .map(|date| date.year())
            .or_else(|| infer_manufacture_year(&self.mot_tests))
    }
}

/// Uppercases and strips whitespace so `ab12 cde` and `AB12CDE` name the same vehicle.
pub fn normalize_registration(raw: &str) -> String {
    raw.chars().filter(|ch| !ch.is_whitespace()).collect::<String>().to_ascii_uppercase()
}

/// Orders tests newest first. Ties keep their input order.
pub fn sort_most_recent_first(tests: &mut [MotTestRecord]) {
    tests.sort_by(|left, right| right.completed_date.cmp(&left.completed_date));
}

/// UK vehicles sit their first MOT at three years old, so the earliest test bounds the
/// registration year when nothing better is known.
pub fn infer_manufacture_year(tests: &[MotTestRecord]) -> Option<i32> {
    tests.iter().map(MotTestRecord::year).min().map(|year| year - 3)
}

pub(crate) fn parse_date_prefix(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let date_part = trimmed.split(['T', ' ']).next().unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%Y.%m.%d"))
        .ok()
}

fn de_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date_prefix(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognised date `{raw}`")))
}

fn de_opt_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_date_prefix))
}

fn ser_date<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&date.format("%Y-%m-%d").to_string())
}

fn ser_opt_date<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match date {
        Some(date) => ser_date(date, serializer),
        None => serializer.serialize_none(),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OdometerReading {
    Number(u64),
    Text(String),
}

// Upstream records carry the reading as a string, sometimes with thousands separators.
fn de_opt_odometer<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let reading = Option::<OdometerReading>::deserialize(deserializer)?;
    Ok(match reading {
        Some(OdometerReading::Number(value)) => u32::try_from(value).ok(),
        Some(OdometerReading::Text(text)) => {
            let digits: String = text.chars().filter(char::is_ascii_digit).collect();
            digits.parse::<u32>().ok()
        }
        None => None,
    })
}
