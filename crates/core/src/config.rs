use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "warrantly.toml";
pub const NESTED_CONFIG_FILE: &str = "config/warrantly.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub pricing: PricingConfig,
    pub mot: MotConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Debug, Default)]
pub struct PricingConfig {
    /// Pins the year used for vehicle age. Unset means the current calendar year.
    pub reference_year: Option<i32>,
}

#[derive(Clone, Debug)]
pub struct MotConfig {
    pub provider: MotProviderKind,
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub fixture_path: Option<PathBuf>,
    pub cache_ttl_secs: u64,
    pub timeout_secs: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotProviderKind {
    Fixture,
    Http,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub reference_year: Option<i32>,
    pub mot_provider: Option<MotProviderKind>,
    pub mot_base_url: Option<String>,
    pub mot_api_key: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            pricing: PricingConfig::default(),
            mot: MotConfig {
                provider: MotProviderKind::Fixture,
                base_url: None,
                api_key: None,
                fixture_path: None,
                cache_ttl_secs: 86_400,
                timeout_secs: 10,
            },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl std::str::FromStr for MotProviderKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fixture" => Ok(Self::Fixture),
            "http" => Ok(Self::Http),
            other => Err(ConfigError::Validation(format!(
                "unsupported mot provider `{other}` (expected fixture|http)"
            ))),
        }
    }
}

impl PricingConfig {
    pub fn reference_year(&self) -> i32 {
        self.reference_year.unwrap_or_else(|| Utc::now().year())
    }

    /// Date quotes are priced as of. A pinned year prices as of January 1st of that year.
    pub fn reference_date(&self) -> NaiveDate {
        let today = Utc::now().date_naive();
        match self.reference_year {
            Some(year) => NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(today),
            None => today,
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(pricing) = patch.pricing {
            if let Some(reference_year) = pricing.reference_year {
                self.pricing.reference_year = Some(reference_year);
            }
        }

        if let Some(mot) = patch.mot {
            if let Some(provider) = mot.provider {
                self.mot.provider = provider;
            }
            if let Some(base_url) = mot.base_url {
                self.mot.base_url = Some(base_url);
            }
            if let Some(mot_api_key_value) = mot.api_key {
                self.mot.api_key = Some(secret_value(mot_api_key_value));
            }
            if let Some(fixture_path) = mot.fixture_path {
                self.mot.fixture_path = Some(fixture_path);
            }
            if let Some(cache_ttl_secs) = mot.cache_ttl_secs {
                self.mot.cache_ttl_secs = cache_ttl_secs;
            }
            if let Some(timeout_secs) = mot.timeout_secs {
                self.mot.timeout_secs = timeout_secs;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("WARRANTLY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("WARRANTLY_SERVER_PORT") {
            self.server.port = parse_u16("WARRANTLY_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("WARRANTLY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("WARRANTLY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("WARRANTLY_LOGGING_LEVEL").or_else(|| read_env("WARRANTLY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("WARRANTLY_LOGGING_FORMAT").or_else(|| read_env("WARRANTLY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        if let Some(value) = read_env("WARRANTLY_PRICING_REFERENCE_YEAR") {
            self.pricing.reference_year =
                Some(parse_i32("WARRANTLY_PRICING_REFERENCE_YEAR", &value)?);
        }

        if let Some(value) = read_env("WARRANTLY_MOT_PROVIDER") {
            self.mot.provider = value.parse()?;
        }
        if let Some(value) = read_env("WARRANTLY_MOT_BASE_URL") {
            self.mot.base_url = Some(value);
        }
        if let Some(value) = read_env("WARRANTLY_MOT_API_KEY") {
            self.mot.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("WARRANTLY_MOT_FIXTURE_PATH") {
            self.mot.fixture_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("WARRANTLY_MOT_CACHE_TTL_SECS") {
            self.mot.cache_ttl_secs = parse_u64("WARRANTLY_MOT_CACHE_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("WARRANTLY_MOT_TIMEOUT_SECS") {
            self.mot.timeout_secs = parse_u64("WARRANTLY_MOT_TIMEOUT_SECS", &value)?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(reference_year) = overrides.reference_year {
            self.pricing.reference_year = Some(reference_year);
        }
        if let Some(provider) = overrides.mot_provider {
            self.mot.provider = provider;
        }
        if let Some(base_url) = overrides.mot_base_url {
            self.mot.base_url = Some(base_url);
        }
        if let Some(api_key) = overrides.mot_api_key {
            self.mot.api_key = Some(secret_value(api_key));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        validate_pricing(&self.pricing)?;
        validate_mot(&self.mot)?;
        Ok(())
    }
}

/// Config file `load` would read for `explicit_path`, if one exists.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_pricing(pricing: &PricingConfig) -> Result<(), ConfigError> {
    match pricing.reference_year {
        Some(year) if !(1990..=2100).contains(&year) => Err(ConfigError::Validation(
            "pricing.reference_year must be in range 1990..=2100".to_string(),
        )),
        _ => Ok(()),
    }
}

fn validate_mot(mot: &MotConfig) -> Result<(), ConfigError> {
    if mot.timeout_secs == 0 || mot.timeout_secs > 120 {
        return Err(ConfigError::Validation("mot.timeout_secs must be in range 1..=120".to_string()));
    }

    if mot.provider == MotProviderKind::Http {
        let base_url = mot.base_url.as_deref().map(str::trim).unwrap_or_default();
        if base_url.is_empty() {
            return Err(ConfigError::Validation(
                "mot.base_url is required for the http provider".to_string(),
            ));
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "mot.base_url must start with http:// or https://".to_string(),
            ));
        }

        let missing_key = mot
            .api_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing_key {
            return Err(ConfigError::Validation(
                "mot.api_key is required for the http provider".to_string(),
            ));
        }
    }

    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_i32(key: &str, value: &str) -> Result<i32, ConfigError> {
    value.trim().parse::<i32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
    pricing: Option<PricingPatch>,
    mot: Option<MotPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    reference_year: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct MotPatch {
    provider: Option<MotProviderKind>,
    base_url: Option<String>,
    api_key: Option<String>,
    fixture_path: Option<PathBuf>,
    cache_ttl_secs: Option<u64>,
    timeout_secs: Option<u64>,
}
