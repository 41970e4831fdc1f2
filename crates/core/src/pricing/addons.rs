use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PaymentTerm {
    #[default]
    #[serde(rename = "12months")]
    TwelveMonths,
    #[serde(rename = "24months")]
    TwentyFourMonths,
    #[serde(rename = "36months")]
    ThirtySixMonths,
}

impl PaymentTerm {
    /// Accepts the spellings used across checkout and admin surfaces. Anything unrecognised
    /// is treated as a twelve-month term.
    pub fn normalize(raw: &str) -> Self {
        let compact = raw.trim().to_ascii_lowercase().replace([' ', '-', '_'], "");
        match compact.as_str() {
            "24" | "24months" | "24month" | "2year" | "2years" | "twoyear" | "twoyears"
            | "twoyearly" => Self::TwentyFourMonths,
            "36" | "36months" | "36month" | "3year" | "3years" | "threeyear" | "threeyears"
            | "threeyearly" => Self::ThirtySixMonths,
            _ => Self::TwelveMonths,
        }
    }

    pub fn months(self) -> u32 {
        match self {
            Self::TwelveMonths => 12,
            Self::TwentyFourMonths => 24,
            Self::ThirtySixMonths => 36,
        }
    }

    pub fn years(self) -> u8 {
        match self {
            Self::TwelveMonths => 1,
            Self::TwentyFourMonths => 2,
            Self::ThirtySixMonths => 3,
        }
    }

    pub fn all() -> [Self; 3] {
        [Self::TwelveMonths, Self::TwentyFourMonths, Self::ThirtySixMonths]
    }
}

impl fmt::Display for PaymentTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}months", self.months())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AddOnKey {
    Breakdown,
    Rental,
    Tyre,
    WearTear,
    European,
    MotRepair,
    MotFee,
    LostKey,
    ConsequentialLoss,
    Transfer,
}

impl AddOnKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakdown => "breakdown",
            Self::Rental => "rental",
            Self::Tyre => "tyre",
            Self::WearTear => "wearTear",
            Self::European => "european",
            Self::MotRepair => "motRepair",
            Self::MotFee => "motFee",
            Self::LostKey => "lostKey",
            Self::ConsequentialLoss => "consequentialLoss",
            Self::Transfer => "transfer",
        }
    }
}

impl std::str::FromStr for AddOnKey {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let compact = value.trim().to_ascii_lowercase().replace([' ', '-', '_', '&'], "");
        match compact.as_str() {
            "breakdown" | "breakdownrecovery" => Ok(Self::Breakdown),
            "rental" | "hirecar" | "carhire" | "vehiclerental" => Ok(Self::Rental),
            "tyre" | "tyres" | "tyrecover" => Ok(Self::Tyre),
            "weartear" | "wearandtear" => Ok(Self::WearTear),
            "european" | "europeancover" | "europe" => Ok(Self::European),
            "motrepair" | "motrepaircover" => Ok(Self::MotRepair),
            "motfee" | "mottestfee" => Ok(Self::MotFee),
            "lostkey" | "lostkeys" | "keycover" => Ok(Self::LostKey),
            "consequentialloss" | "consequential" => Ok(Self::ConsequentialLoss),
            "transfer" | "transfercover" => Ok(Self::Transfer),
            _ => Err(DomainError::InvariantViolation(format!("unknown add-on `{value}`"))),
        }
    }
}

impl fmt::Display for AddOnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "camelCase")]
pub enum AddOnRate {
    Monthly(Decimal),
    OneTime(Decimal),
}

impl AddOnRate {
    pub fn charge_for(self, duration_months: u32) -> Decimal {
        match self {
            Self::Monthly(rate) => rate * Decimal::from(duration_months),
            Self::OneTime(amount) => amount,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOnCatalogEntry {
    pub key: AddOnKey,
    pub name: &'static str,
    pub rate: AddOnRate,
    pub description: &'static str,
}

impl AddOnCatalogEntry {
    pub fn monthly_price(&self) -> Option<Decimal> {
        match self.rate {
            AddOnRate::Monthly(rate) => Some(rate),
            AddOnRate::OneTime(_) => None,
        }
    }

    pub fn one_time_price(&self) -> Option<Decimal> {
        match self.rate {
            AddOnRate::OneTime(amount) => Some(amount),
            AddOnRate::Monthly(_) => None,
        }
    }

    pub fn is_auto_included(&self, term: PaymentTerm) -> bool {
        auto_included_add_ons(term).contains(&self.key)
    }
}

/// Ordered as [`AddOnKey`] is declared.
pub static ADD_ON_CATALOG: [AddOnCatalogEntry; 10] = [
    AddOnCatalogEntry {
        key: AddOnKey::Breakdown,
        name: "Breakdown Recovery",
        rate: AddOnRate::Monthly(Decimal::from_parts(399, 0, 0, false, 2)),
        description: "24/7 roadside assistance and recovery to a garage of your choice.",
    },
    AddOnCatalogEntry {
        key: AddOnKey::Rental,
        name: "Hire Car Cover",
        rate: AddOnRate::Monthly(Decimal::from_parts(699, 0, 0, false, 2)),
        description: "A replacement vehicle while yours is off the road for a covered repair.",
    },
    AddOnCatalogEntry {
        key: AddOnKey::Tyre,
        name: "Tyre Cover",
        rate: AddOnRate::Monthly(Decimal::from_parts(799, 0, 0, false, 2)),
        description: "Repair or replacement of tyres damaged by punctures and road hazards.",
    },
    AddOnCatalogEntry {
        key: AddOnKey::WearTear,
        name: "Wear & Tear Cover",
        rate: AddOnRate::Monthly(Decimal::from_parts(999, 0, 0, false, 2)),
        description: "Covers components that fail through gradual deterioration.",
    },
    AddOnCatalogEntry {
        key: AddOnKey::European,
        name: "European Cover",
        rate: AddOnRate::Monthly(Decimal::from_parts(599, 0, 0, false, 2)),
        description: "Extends repair cover to trips within the EU.",
    },
    AddOnCatalogEntry {
        key: AddOnKey::MotRepair,
        name: "MOT Repair Cover",
        rate: AddOnRate::Monthly(Decimal::from_parts(400, 0, 0, false, 2)),
        description: "Pays for repairs needed to pass the annual MOT.",
    },
    AddOnCatalogEntry {
        key: AddOnKey::MotFee,
        name: "MOT Test Fee",
        rate: AddOnRate::Monthly(Decimal::from_parts(199, 0, 0, false, 2)),
        description: "The annual MOT test fee, paid for you.",
    },
    AddOnCatalogEntry {
        key: AddOnKey::LostKey,
        name: "Lost Key Cover",
        rate: AddOnRate::Monthly(Decimal::from_parts(300, 0, 0, false, 2)),
        description: "Replacement keys, locks and locksmith call-outs.",
    },
    AddOnCatalogEntry {
        key: AddOnKey::ConsequentialLoss,
        name: "Consequential Loss Cover",
        rate: AddOnRate::Monthly(Decimal::from_parts(500, 0, 0, false, 2)),
        description: "Damage to other parts caused by the failure of a covered part.",
    },
    AddOnCatalogEntry {
        key: AddOnKey::Transfer,
        name: "Transfer Cover",
        rate: AddOnRate::OneTime(Decimal::from_parts(1999, 0, 0, false, 2)),
        description: "Transfer the remaining warranty to a new owner if you sell the vehicle.",
    },
];

pub fn catalog_entry(key: AddOnKey) -> &'static AddOnCatalogEntry {
    &ADD_ON_CATALOG[key as usize]
}

/// Add-ons bundled free for the term.
pub fn auto_included_add_ons(term: PaymentTerm) -> BTreeSet<AddOnKey> {
    let keys: &[AddOnKey] = match term {
        PaymentTerm::TwelveMonths => &[],
        PaymentTerm::TwentyFourMonths => &[AddOnKey::Breakdown, AddOnKey::MotFee],
        PaymentTerm::ThirtySixMonths => &[AddOnKey::Breakdown, AddOnKey::MotFee, AddOnKey::Rental],
    };
    keys.iter().copied().collect()
}

/// `auto_included_add_ons` for a raw term string.
pub fn get_auto_included_add_ons(raw_term: &str) -> BTreeSet<AddOnKey> {
    auto_included_add_ons(PaymentTerm::normalize(raw_term))
}

/// Resolves UI-style `{key: selected}` maps. Unknown keys are skipped.
pub fn parse_selections(selections: &BTreeMap<String, bool>) -> BTreeSet<AddOnKey> {
    selections
        .iter()
        .filter(|(_, selected)| **selected)
        .filter_map(|(raw, _)| match raw.parse::<AddOnKey>() {
            Ok(key) => Some(key),
            Err(_) => {
                debug!(
                    event_name = "pricing.add_ons.unknown_key",
                    key = %raw,
                    "ignoring unknown add-on selection"
                );
                None
            }
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOnLine {
    pub key: AddOnKey,
    pub name: String,
    pub included_free: bool,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOnQuote {
    pub term: PaymentTerm,
    pub duration_months: u32,
    pub auto_included: BTreeSet<AddOnKey>,
    pub lines: Vec<AddOnLine>,
    pub total: Decimal,
}

/// Itemized add-on pricing for the selected keys.
pub fn add_on_quote(
    selections: &BTreeSet<AddOnKey>,
    term: PaymentTerm,
    duration_months: u32,
) -> AddOnQuote {
    let auto_included = auto_included_add_ons(term);
    let lines: Vec<AddOnLine> = selections
        .iter()
        .map(|key| {
            let entry = catalog_entry(*key);
            let included_free = auto_included.contains(key);
            let amount =
                if included_free { Decimal::ZERO } else { entry.rate.charge_for(duration_months) };
            AddOnLine { key: *key, name: entry.name.to_string(), included_free, amount }
        })
        .collect();
    let total = round_currency(lines.iter().map(|line| line.amount).sum());

    AddOnQuote { term, duration_months, auto_included, lines, total }
}

pub fn calculate_add_on_price(
    selections: &BTreeSet<AddOnKey>,
    term: PaymentTerm,
    duration_months: u32,
) -> Decimal {
    add_on_quote(selections, term, duration_months).total
}

/// Two decimal places, halves rounded up.
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use rust_decimal::Decimal;

    use super::{
        add_on_quote, calculate_add_on_price, catalog_entry, get_auto_included_add_ons,
        parse_selections, round_currency, AddOnKey, PaymentTerm, ADD_ON_CATALOG,
    };

    #[test]
    fn normalizes_term_spellings() {
        for raw in ["monthly", "1year", "yearly", "12months", "", "fortnightly"] {
            assert_eq!(PaymentTerm::normalize(raw), PaymentTerm::TwelveMonths, "{raw}");
        }
        for raw in ["2year", "twoyearly", "24months", "2 Years", "two-year"] {
            assert_eq!(PaymentTerm::normalize(raw), PaymentTerm::TwentyFourMonths, "{raw}");
        }
        for raw in ["3year", "threeyearly", "36months", "3-years"] {
            assert_eq!(PaymentTerm::normalize(raw), PaymentTerm::ThirtySixMonths, "{raw}");
        }
    }

    #[test]
    fn auto_inclusions_grow_with_term() {
        assert!(get_auto_included_add_ons("12months").is_empty());

        let two_year = get_auto_included_add_ons("24months");
        assert!(two_year.contains(&AddOnKey::Breakdown));
        assert!(two_year.contains(&AddOnKey::MotFee));
        assert_eq!(two_year.len(), 2);

        let three_year = get_auto_included_add_ons("36months");
        assert!(three_year.is_superset(&two_year));
        assert!(three_year.contains(&AddOnKey::Rental));
        assert!(catalog_entry(AddOnKey::Rental).is_auto_included(PaymentTerm::ThirtySixMonths));
    }

    #[test]
    fn no_selections_cost_nothing() {
        for term in PaymentTerm::all() {
            for duration in [0, 12, 24, 36, 60] {
                assert_eq!(calculate_add_on_price(&BTreeSet::new(), term, duration), Decimal::ZERO);
            }
        }
    }

    #[test]
    fn breakdown_is_charged_at_twelve_months_and_free_at_twenty_four() {
        let selections = BTreeSet::from([AddOnKey::Breakdown]);
        assert_eq!(
            calculate_add_on_price(&selections, PaymentTerm::normalize("12months"), 12),
            Decimal::new(4788, 2)
        );
        assert_eq!(
            calculate_add_on_price(&selections, PaymentTerm::normalize("24months"), 24),
            Decimal::ZERO
        );
    }

    #[test]
    fn transfer_cover_is_a_flat_fee() {
        let selections = BTreeSet::from([AddOnKey::Transfer, AddOnKey::Tyre]);
        let quote = add_on_quote(&selections, PaymentTerm::ThirtySixMonths, 36);

        // 7.99 * 36 + 19.99
        assert_eq!(quote.total, Decimal::new(30763, 2));
        let transfer = quote.lines.iter().find(|line| line.key == AddOnKey::Transfer);
        assert_eq!(transfer.map(|line| line.amount), Some(Decimal::new(1999, 2)));
    }

    #[test]
    fn itemizes_free_lines_within_a_mixed_selection() {
        let selections = BTreeSet::from([AddOnKey::Breakdown, AddOnKey::Rental, AddOnKey::LostKey]);
        let quote = add_on_quote(&selections, PaymentTerm::TwentyFourMonths, 24);

        let free: Vec<AddOnKey> =
            quote.lines.iter().filter(|line| line.included_free).map(|line| line.key).collect();
        assert_eq!(free, vec![AddOnKey::Breakdown]);
        // 6.99 * 24 + 3.00 * 24
        assert_eq!(quote.total, Decimal::new(23976, 2));
    }

    #[test]
    fn parses_ui_selection_maps_and_skips_unknown_keys() {
        let raw = BTreeMap::from([
            ("breakdown".to_string(), true),
            ("wearTear".to_string(), true),
            ("motFee".to_string(), false),
            ("gap_insurance".to_string(), true),
        ]);
        let parsed = parse_selections(&raw);
        assert_eq!(parsed, BTreeSet::from([AddOnKey::Breakdown, AddOnKey::WearTear]));
    }

    #[test]
    fn catalog_has_exactly_one_one_time_entry() {
        let one_time: Vec<AddOnKey> = ADD_ON_CATALOG
            .iter()
            .filter(|entry| entry.one_time_price().is_some())
            .map(|entry| entry.key)
            .collect();
        assert_eq!(one_time, vec![AddOnKey::Transfer]);
        assert!(ADD_ON_CATALOG
            .iter()
            .all(|entry| entry.monthly_price().is_some() != entry.one_time_price().is_some()));
        for entry in &ADD_ON_CATALOG {
            assert_eq!(entry.key.as_str().parse::<AddOnKey>(), Ok(entry.key));
            assert_eq!(catalog_entry(entry.key).key, entry.key);
        }
    }

    #[test]
    fn rounds_half_cents_up() {
        assert_eq!(round_currency(Decimal::new(10005, 3)), Decimal::new(1001, 2));
        assert_eq!(round_currency(Decimal::new(10004, 3)), Decimal::new(1000, 2));
    }
}
