use serde::{Deserialize, Serialize};

use crate::domain::mot::{infer_manufacture_year, sort_most_recent_first, MotTestRecord};

/// Brands priced on the premium ladder uplift. Matched against normalized makes.
pub const PREMIUM_BRANDS: &[&str] = &[
    "alfa romeo",
    "audi",
    "bmw",
    "ds",
    "genesis",
    "infiniti",
    "jaguar",
    "land rover",
    "lexus",
    "mercedes",
    "mini",
    "polestar",
    "porsche",
    "range rover",
    "tesla",
    "volvo",
];

/// Model-name keywords that identify light commercial vehicles.
pub const VAN_KEYWORDS: &[&str] = &[
    "berlingo",
    "boxer",
    "caddy",
    "combo",
    "crafter",
    "dispatch",
    "doblo",
    "ducato",
    "expert",
    "kangoo",
    "master",
    "movano",
    "nv200",
    "partner",
    "proace",
    "relay",
    "sprinter",
    "trafic",
    "transit",
    "transporter",
    "van",
    "vito",
    "vivaro",
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FuelType {
    Petrol,
    Diesel,
    Hybrid,
    Electric,
    #[default]
    Other,
}

impl From<String> for FuelType {
    fn from(value: String) -> Self {
        let lower = value.trim().to_ascii_lowercase();
        if lower.contains("hybrid") {
            Self::Hybrid
        } else if lower.starts_with("electric") || lower == "ev" {
            Self::Electric
        } else if lower.starts_with("petrol") || lower == "gasoline" {
            Self::Petrol
        } else if lower.starts_with("diesel") {
            Self::Diesel
        } else {
            Self::Other
        }
    }
}

impl From<FuelType> for String {
    fn from(value: FuelType) -> Self {
        match value {
            FuelType::Petrol => "petrol",
            FuelType::Diesel => "diesel",
            FuelType::Hybrid => "hybrid",
            FuelType::Electric => "electric",
            FuelType::Other => "other",
        }
        .to_string()
    }
}

/// Lowercases, trims, drops punctuation other than hyphens, collapses whitespace and folds
/// `mercedes-benz` into `mercedes`.
pub fn normalize_vehicle_name(raw: &str) -> String {
    let cleaned: String = raw
        .to_lowercase()
        .chars()
        .map(|ch| if ch.is_alphanumeric() || ch == '-' || ch.is_whitespace() { ch } else { ' ' })
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed == "mercedes-benz" || collapsed == "mercedes benz" {
        return "mercedes".to_string();
    }
    collapsed
}

pub fn is_premium_brand(make: &str) -> bool {
    let normalized = normalize_vehicle_name(make);
    PREMIUM_BRANDS.contains(&normalized.as_str())
}

pub fn is_van_model(model: &str) -> bool {
    let normalized = normalize_vehicle_name(model);
    normalized
        .split(|ch: char| ch.is_whitespace() || ch == '-')
        .any(|token| VAN_KEYWORDS.contains(&token))
}

/// Vehicle attributes the pricing engine consumes. Derived flags are fixed at construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VehicleProfile {
    pub make: String,
    pub model: String,
    pub manufacture_year: i32,
    pub fuel_type: FuelType,
    pub body_type: Option<String>,
    pub engine_capacity: Option<u32>,
    pub is_van: bool,
    pub is_premium_brand: bool,
    pub is_ev: bool,
    pub is_phev: bool,
    /// Newest test first.
    pub mot_history: Vec<MotTestRecord>,
}

impl VehicleProfile {
    pub fn new(
        make: impl Into<String>,
        model: impl Into<String>,
        manufacture_year: i32,
        fuel_type: FuelType,
    ) -> Self {
        let make = make.into();
        let model = model.into();
        Self {
            is_van: is_van_model(&model),
            is_premium_brand: is_premium_brand(&make),
            is_ev: fuel_type == FuelType::Electric,
            is_phev: false,
            make,
            model,
            manufacture_year,
            fuel_type,
            body_type: None,
            engine_capacity: None,
            mot_history: Vec::new(),
        }
    }

    pub fn with_mot_history(mut self, mut history: Vec<MotTestRecord>) -> Self {
        sort_most_recent_first(&mut history);
        self.mot_history = history;
        self
    }

    pub fn with_phev(mut self, is_phev: bool) -> Self {
        self.is_phev = is_phev;
        self
    }

    pub fn with_body_type(mut self, body_type: Option<String>) -> Self {
        if let Some(body) = body_type.as_deref() {
            if normalize_vehicle_name(body).contains("van") {
                self.is_van = true;
            }
        }
        self.body_type = body_type;
        self
    }

    pub fn with_engine_capacity(mut self, engine_capacity: Option<u32>) -> Self {
        self.engine_capacity = engine_capacity;
        self
    }

    /// Whole years since manufacture; never negative.
    pub fn age(&self, reference_year: i32) -> u32 {
        u32::try_from(reference_year.saturating_sub(self.manufacture_year)).unwrap_or(0)
    }

    pub fn recent_tests(&self, count: usize) -> &[MotTestRecord] {
        &self.mot_history[..self.mot_history.len().min(count)]
    }
}

/// Wire form of a vehicle as supplied by quote callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleInput {
    pub make: String,
    pub model: String,
    #[serde(default)]
    pub manufacture_year: Option<i32>,
    #[serde(default)]
    pub fuel_type: FuelType,
    #[serde(default)]
    pub body_type: Option<String>,
    #[serde(default)]
    pub engine_capacity: Option<u32>,
    #[serde(default, rename = "isPHEV", alias = "isPhev")]
    pub is_phev: bool,
    #[serde(default)]
    pub mot_history: Vec<MotTestRecord>,
}

impl VehicleInput {
    /// Explicit year, else one inferred from the earliest MOT test.
    pub fn resolved_manufacture_year(&self) -> Option<i32> {
        self.manufacture_year.or_else(|| infer_manufacture_year(&self.mot_history))
    }

    /// `None` when no manufacture year can be resolved.
    pub fn to_profile(&self) -> Option<VehicleProfile> {
        let year = self.resolved_manufacture_year()?;
        Some(
            VehicleProfile::new(self.make.clone(), self.model.clone(), year, self.fuel_type)
                .with_body_type(self.body_type.clone())
                .with_engine_capacity(self.engine_capacity)
                .with_phev(self.is_phev)
                .with_mot_history(self.mot_history.clone()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{
        is_premium_brand, is_van_model, normalize_vehicle_name, FuelType, VehicleInput,
        VehicleProfile,
    };

    #[test]
    fn normalization_strips_punctuation_and_folds_mercedes() {
        assert_eq!(normalize_vehicle_name("  Mercedes-Benz "), "mercedes");
        assert_eq!(normalize_vehicle_name("RS3   Sportback!"), "rs3 sportback");
        assert_eq!(normalize_vehicle_name("Rolls-Royce"), "rolls-royce");
        assert_eq!(normalize_vehicle_name("A.M.G. GT"), "a m g gt");
    }

    #[test]
    fn derives_premium_van_and_ev_flags() {
        let profile = VehicleProfile::new("Mercedes-Benz", "Sprinter 314 CDI", 2020, FuelType::Diesel);
        assert!(profile.is_premium_brand);
        assert!(profile.is_van);
        assert!(!profile.is_ev);

        let tesla = VehicleProfile::new("Tesla", "Model 3", 2021, FuelType::Electric);
        assert!(tesla.is_ev);
        assert!(!tesla.is_van);

        assert!(!is_premium_brand("Ford"));
        assert!(is_van_model("Transit Custom"));
        assert!(!is_van_model("Vanquish"));
    }

    #[test]
    fn age_is_never_negative() {
        let profile = VehicleProfile::new("Ford", "Fiesta", 2027, FuelType::Petrol);
        assert_eq!(profile.age(2026), 0);
        assert_eq!(profile.age(2030), 3);

        let ancient = VehicleProfile::new("Ford", "Fiesta", i32::MIN, FuelType::Petrol);
        assert_eq!(ancient.age(2026), 2_147_483_647);
        let distant = VehicleProfile::new("Ford", "Fiesta", i32::MAX, FuelType::Petrol);
        assert_eq!(distant.age(2026), 0);
    }

    #[test]
    fn input_infers_year_from_mot_history_when_missing() {
        let input: VehicleInput = serde_json::from_value(serde_json::json!({
            "make": "Ford",
            "model": "Focus",
            "fuelType": "PETROL",
            "motHistory": [
                {"completedDate": "2018-06-01", "testResult": "PASSED"},
                {"completedDate": "2021-06-01", "testResult": "FAILED"}
            ]
        }))
        .expect("input should decode");

        let profile = input.to_profile().expect("year should be inferred");
        assert_eq!(profile.manufacture_year, 2015);
        assert_eq!(profile.fuel_type, FuelType::Petrol);
        assert_eq!(profile.mot_history[0].year(), 2021);
    }
}
