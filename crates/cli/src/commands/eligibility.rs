use std::path::Path;

use warrantly_core::check_eligibility;

use crate::commands::{load_config, read_mot_file, CommandResult};

const COMMAND: &str = "eligibility";

pub fn run(
    make: &str,
    model: &str,
    manufacture_year: Option<i32>,
    mot_file: Option<&Path>,
) -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let mot_history = match mot_file.map(|path| read_mot_file(COMMAND, path)).transpose() {
        Ok(loaded) => loaded.map(|(tests, _)| tests),
        Err(failure) => return failure,
    };

    let result = check_eligibility(
        make,
        model,
        manufacture_year,
        mot_history.as_deref(),
        config.pricing.reference_year(),
    );

    match &result.reason {
        Some(reason) if result.blocked => CommandResult::blocked(
            COMMAND,
            format!("{make} {model} is not eligible: {reason}"),
            &result,
        ),
        _ => {
            CommandResult::report(COMMAND, format!("{make} {model} is eligible for cover"), &result)
        }
    }
}
