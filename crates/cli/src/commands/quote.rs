use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;
use warrantly_core::{
    AddOnKey, DeterministicQuoteRuntime, FuelType, PaymentMethod, QuoteRequest, QuoteRuntime,
    VehicleInput,
};

use crate::commands::{
    load_config, read_json_file, read_mot_file, CommandResult, EXIT_INVALID_INPUT,
};

const COMMAND: &str = "quote";

#[derive(Debug, Clone, Default, Args)]
pub struct QuoteArgs {
    #[arg(long, help = "JSON quote request file; replaces the vehicle flags below")]
    pub request: Option<PathBuf>,
    #[arg(long)]
    pub make: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long, help = "Manufacture year; inferred from MOT history when omitted")]
    pub year: Option<i32>,
    #[arg(long, help = "petrol|diesel|hybrid|electric")]
    pub fuel: Option<String>,
    #[arg(long, help = "Vehicle is a plug-in hybrid")]
    pub phev: bool,
    #[arg(long, help = "12months|24months|36months")]
    pub term: Option<String>,
    #[arg(long, help = "full|monthly")]
    pub method: Option<String>,
    #[arg(long = "add-on", help = "Add-on key; repeat for several")]
    pub add_ons: Vec<String>,
    #[arg(long, help = "MOT history JSON (array of tests or a vehicle record)")]
    pub mot_file: Option<PathBuf>,
    #[arg(long, help = "Current odometer reading in miles")]
    pub mileage: Option<u32>,
}

pub fn run(args: QuoteArgs) -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let request = match build_request(args) {
        Ok(request) => request,
        Err(failure) => return failure,
    };

    let runtime = DeterministicQuoteRuntime::default();
    match runtime.quote(&request, config.pricing.reference_date()) {
        Ok(outcome) => match &outcome.matrix {
            Some(matrix) => CommandResult::report(
                COMMAND,
                format!(
                    "tier {} at £{} per year ({:?} payment £{})",
                    matrix.tier,
                    matrix.base_annual_price,
                    matrix.payment_method,
                    matrix.payable.one_year
                ),
                &outcome,
            ),
            None => CommandResult::blocked(
                COMMAND,
                outcome.eligibility.reason.clone().unwrap_or_else(|| "vehicle blocked".to_string()),
                &outcome,
            ),
        },
        Err(error) => {
            CommandResult::failure(COMMAND, "invalid_input", error.to_string(), EXIT_INVALID_INPUT)
        }
    }
}

fn build_request(args: QuoteArgs) -> Result<QuoteRequest, CommandResult> {
    if let Some(path) = &args.request {
        return read_json_file(COMMAND, path);
    }

    let (Some(make), Some(model)) = (args.make, args.model) else {
        return Err(CommandResult::failure(
            COMMAND,
            "invalid_input",
            "--make and --model are required without --request",
            EXIT_INVALID_INPUT,
        ));
    };

    let payment_method = match args.method.as_deref().map(str::parse::<PaymentMethod>) {
        Some(Ok(method)) => method,
        Some(Err(error)) => {
            return Err(CommandResult::failure(
                COMMAND,
                "invalid_input",
                error.to_string(),
                EXIT_INVALID_INPUT,
            ))
        }
        None => PaymentMethod::default(),
    };

    let (mot_history, manufacture_date) = match &args.mot_file {
        Some(path) => read_mot_file(COMMAND, path)?,
        None => (Vec::new(), None),
    };

    let mut add_ons = BTreeMap::new();
    for raw in &args.add_ons {
        let key = raw.parse::<AddOnKey>().map_err(|error| {
            CommandResult::failure(COMMAND, "invalid_input", error.to_string(), EXIT_INVALID_INPUT)
        })?;
        add_ons.insert(key.as_str().to_string(), true);
    }

    Ok(QuoteRequest {
        vehicle: VehicleInput {
            make,
            model,
            manufacture_year: args.year,
            fuel_type: args.fuel.map(FuelType::from).unwrap_or_default(),
            body_type: None,
            engine_capacity: None,
            is_phev: args.phev,
            mot_history,
        },
        payment_term: args.term,
        payment_method,
        add_ons,
        duration_months: None,
        current_mileage: args.mileage,
        manufacture_date,
    })
}
