use std::env;
use std::fs;
use std::path::Path;

use secrecy::ExposeSecret;
use toml::Value;
use warrantly_core::config::resolve_config_path;

use crate::commands::{load_config, CommandResult};

const COMMAND: &str = "config";

pub fn run() -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let reference_year = match config.pricing.reference_year {
        Some(year) => year.to_string(),
        None => format!("<current year: {}>", config.pricing.reference_year()),
    };
    let api_key = match &config.mot.api_key {
        Some(key) => redact_key(key.expose_secret()),
        None => "<unset>".to_string(),
    };
    let fixture_path = config
        .mot
        .fixture_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unset>".to_string());

    let fields: [(&str, String, &str); 12] = [
        ("server.bind_address", config.server.bind_address.clone(), "WARRANTLY_SERVER_BIND_ADDRESS"),
        ("server.port", config.server.port.to_string(), "WARRANTLY_SERVER_PORT"),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            "WARRANTLY_SERVER_GRACEFUL_SHUTDOWN_SECS",
        ),
        ("logging.level", config.logging.level.clone(), "WARRANTLY_LOGGING_LEVEL"),
        ("logging.format", format!("{:?}", config.logging.format), "WARRANTLY_LOGGING_FORMAT"),
        ("pricing.reference_year", reference_year, "WARRANTLY_PRICING_REFERENCE_YEAR"),
        ("mot.provider", format!("{:?}", config.mot.provider), "WARRANTLY_MOT_PROVIDER"),
        (
            "mot.base_url",
            config.mot.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            "WARRANTLY_MOT_BASE_URL",
        ),
        ("mot.api_key", api_key, "WARRANTLY_MOT_API_KEY"),
        ("mot.fixture_path", fixture_path, "WARRANTLY_MOT_FIXTURE_PATH"),
        ("mot.cache_ttl_secs", config.mot.cache_ttl_secs.to_string(), "WARRANTLY_MOT_CACHE_TTL_SECS"),
        ("mot.timeout_secs", config.mot.timeout_secs.to_string(), "WARRANTLY_MOT_TIMEOUT_SECS"),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(fields.into_iter().map(|(key, value, env_key)| {
        render_line(
            key,
            &value,
            field_source(key, Some(env_key), config_file_doc.as_ref(), config_file_path.as_deref()),
        )
    }));

    CommandResult::success(COMMAND, lines.join("\n"))
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the last four characters of long keys so operators can tell keys apart.
fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= 8 {
        return "<redacted>".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{tail}")
}
