use serde_json::json;
use warrantly_core::pricing::addons::{PaymentTerm, ADD_ON_CATALOG};
use warrantly_core::pricing::tiers::BASE_PRICE_LADDER;
use warrantly_core::reliability::RELIABILITY_TIERS;

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    let add_ons: Vec<_> = ADD_ON_CATALOG
        .iter()
        .map(|entry| {
            let included_on: Vec<String> = PaymentTerm::all()
                .into_iter()
                .filter(|term| entry.is_auto_included(*term))
                .map(|term| term.to_string())
                .collect();
            json!({
                "key": entry.key,
                "name": entry.name,
                "description": entry.description,
                "monthlyPrice": entry.monthly_price(),
                "oneTimePrice": entry.one_time_price(),
                "includedOn": included_on,
            })
        })
        .collect();

    let reliability_tiers: Vec<_> = RELIABILITY_TIERS
        .iter()
        .map(|tier| {
            json!({
                "tier": tier.tier,
                "minScore": tier.min_score,
                "label": tier.label,
                "pricing": tier.pricing,
            })
        })
        .collect();

    CommandResult::report(
        "catalog",
        format!(
            "{} add-ons, {} ladder tiers, {} reliability tiers",
            add_ons.len(),
            BASE_PRICE_LADDER.len(),
            reliability_tiers.len()
        ),
        json!({
            "addOns": add_ons,
            "baseLadder": BASE_PRICE_LADDER,
            "reliabilityTiers": reliability_tiers,
        }),
    )
}
