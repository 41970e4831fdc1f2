use std::path::Path;

use chrono::NaiveDate;
use warrantly_core::score_reliability;

use crate::commands::{load_config, read_mot_file, CommandResult};

const COMMAND: &str = "reliability";

/// Scores an MOT history file. `manufacture_date` overrides any date found in the file.
pub fn run(
    mot_file: &Path,
    mileage: Option<u32>,
    manufacture_date: Option<NaiveDate>,
) -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let (tests, recorded_date) = match read_mot_file(COMMAND, mot_file) {
        Ok(loaded) => loaded,
        Err(failure) => return failure,
    };

    let result = score_reliability(
        &tests,
        manufacture_date.or(recorded_date),
        mileage,
        config.pricing.reference_date(),
    );

    CommandResult::report(
        COMMAND,
        format!("score {} ({}), tier {}", result.score, result.tier_label, result.tier),
        &result,
    )
}
