pub mod add_ons;
pub mod catalog;
pub mod config;
pub mod eligibility;
pub mod quote;
pub mod reliability;

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use warrantly_core::config::{AppConfig, LoadOptions};
use warrantly_core::{MotTestRecord, VehicleRecord};

pub const EXIT_BLOCKED: u8 = 1;
pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_INVALID_INPUT: u8 = 3;
pub const EXIT_IO: u8 = 4;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::with_data(command, "ok", 0, message, None)
    }

    /// Success carrying a structured payload under `data`.
    pub fn report(command: &str, message: impl Into<String>, data: impl Serialize) -> Self {
        Self::with_data(command, "ok", 0, message, serde_json::to_value(data).ok())
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    fn with_data(
        command: &str,
        status: &str,
        exit_code: u8,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: status.to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub(crate) fn blocked(command: &str, message: impl Into<String>, data: impl Serialize) -> Self {
        Self::with_data(command, "blocked", EXIT_BLOCKED, message, serde_json::to_value(data).ok())
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(command, "config_validation", error.to_string(), EXIT_CONFIG)
    })
}

pub(crate) fn read_json_file<T: DeserializeOwned>(
    command: &str,
    path: &Path,
) -> Result<T, CommandResult> {
    let raw = fs::read_to_string(path).map_err(|error| {
        CommandResult::failure(
            command,
            "io",
            format!("could not read `{}`: {error}", path.display()),
            EXIT_IO,
        )
    })?;
    serde_json::from_str(&raw).map_err(|error| {
        CommandResult::failure(
            command,
            "invalid_input",
            format!("could not parse `{}`: {error}", path.display()),
            EXIT_INVALID_INPUT,
        )
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MotFile {
    Tests(Vec<MotTestRecord>),
    Vehicle(VehicleRecord),
}

/// MOT tests plus the manufacture date when the file is a full vehicle record.
pub(crate) fn read_mot_file(
    command: &str,
    path: &Path,
) -> Result<(Vec<MotTestRecord>, Option<NaiveDate>), CommandResult> {
    Ok(match read_json_file::<MotFile>(command, path)? {
        MotFile::Tests(tests) => (tests, None),
        MotFile::Vehicle(vehicle) => (vehicle.mot_tests, vehicle.manufacture_date),
    })
}
