use std::collections::BTreeSet;

use warrantly_core::pricing::addons::{add_on_quote, AddOnKey, PaymentTerm};

use crate::commands::{CommandResult, EXIT_INVALID_INPUT};

const COMMAND: &str = "add-ons";

/// Prices the named add-ons. Unknown names are rejected rather than skipped.
pub fn run(term: &str, add_ons: &[String], duration_months: Option<u32>) -> CommandResult {
    let mut selections = BTreeSet::new();
    for raw in add_ons {
        match raw.parse::<AddOnKey>() {
            Ok(key) => {
                selections.insert(key);
            }
            Err(error) => {
                return CommandResult::failure(
                    COMMAND,
                    "invalid_input",
                    error.to_string(),
                    EXIT_INVALID_INPUT,
                )
            }
        }
    }

    let term = PaymentTerm::normalize(term);
    let duration_months = duration_months.unwrap_or_else(|| term.months());
    let quote = add_on_quote(&selections, term, duration_months);

    CommandResult::report(
        COMMAND,
        format!(
            "{} add-on(s) over {duration_months} months on the {term} plan: £{}",
            quote.lines.len(),
            quote.total
        ),
        &quote,
    )
}
