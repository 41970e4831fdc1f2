use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};
use warrantly_core::config::{AppConfig, ConfigError, MotConfig, MotProviderKind};
use warrantly_core::DeterministicQuoteRuntime;

use crate::mot::{
    CachedMotHistory, FixtureMotHistory, HttpMotHistory, MotHistoryProvider, MotProviderError,
};
use crate::routes::AppState;

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not read MOT fixture file `{path}`: {source}")]
    FixtureRead { path: PathBuf, source: std::io::Error },
    #[error("could not parse MOT fixture file `{path}`: {source}")]
    FixtureParse { path: PathBuf, source: serde_json::Error },
    #[error("MOT history client could not be built: {0}")]
    MotClient(#[source] MotProviderError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    config.validate()?;

    let mot = build_mot_provider(&config.mot).await?;
    info!(
        event_name = "system.bootstrap.mot_provider_ready",
        correlation_id = "bootstrap",
        provider = mot.name(),
        cache_ttl_secs = config.mot.cache_ttl_secs,
        "MOT history provider configured"
    );

    let state = AppState {
        runtime: Arc::new(DeterministicQuoteRuntime::default()),
        mot,
        pricing: config.pricing.clone(),
    };

    Ok(Application { config, state })
}

async fn build_mot_provider(
    mot: &MotConfig,
) -> Result<Arc<dyn MotHistoryProvider>, BootstrapError> {
    let ttl = Duration::from_secs(mot.cache_ttl_secs);

    match mot.provider {
        MotProviderKind::Fixture => {
            let fixtures = match &mot.fixture_path {
                Some(path) => load_fixtures(path).await?,
                None => FixtureMotHistory::default(),
            };
            if fixtures.is_empty() {
                warn!(
                    event_name = "system.bootstrap.mot_fixture_empty",
                    correlation_id = "bootstrap",
                    "fixture MOT provider has no records; every lookup will miss"
                );
            } else {
                info!(
                    event_name = "system.bootstrap.mot_fixture_loaded",
                    correlation_id = "bootstrap",
                    records = fixtures.len(),
                    "MOT fixtures loaded"
                );
            }
            Ok(Arc::new(CachedMotHistory::new(fixtures, ttl)))
        }
        MotProviderKind::Http => {
            let base_url = mot.base_url.clone().unwrap_or_default();
            let api_key = mot.api_key.clone().unwrap_or_else(|| String::new().into());
            let client =
                HttpMotHistory::new(base_url, api_key, Duration::from_secs(mot.timeout_secs))
                    .map_err(BootstrapError::MotClient)?;
            Ok(Arc::new(CachedMotHistory::new(client, ttl)))
        }
    }
}

async fn load_fixtures(path: &Path) -> Result<FixtureMotHistory, BootstrapError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| BootstrapError::FixtureRead { path: path.to_path_buf(), source })?;
    FixtureMotHistory::from_json(&raw)
        .map_err(|source| BootstrapError::FixtureParse { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;
    use warrantly_core::config::{AppConfig, MotProviderKind};

    use crate::bootstrap::{bootstrap_with_config, BootstrapError};

    #[tokio::test]
    async fn bootstrap_fails_fast_when_http_provider_has_no_key() {
        let mut config = AppConfig::default();
        config.mot.provider = MotProviderKind::Http;
        config.mot.base_url = Some("https://history.example.test".to_string());

        let result = bootstrap_with_config(config).await;

        assert!(matches!(result, Err(BootstrapError::Config(_))));
        let message = result.err().map(|error| error.to_string()).unwrap_or_default();
        assert!(message.contains("mot.api_key"));
    }

    #[tokio::test]
    async fn fixture_file_backs_registration_lookups() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("mot.json");
        fs::write(
            &path,
            r#"[{"registration": "AB12 CDE", "make": "FORD", "model": "FOCUS", "motTests": []}]"#,
        )
        .expect("write fixture");

        let mut config = AppConfig::default();
        config.mot.fixture_path = Some(path);
        let app = bootstrap_with_config(config).await.expect("bootstrap should succeed");

        assert_eq!(app.state.mot.name(), "fixture");
        let record = app.state.mot.fetch("ab12cde").await.expect("fixture vehicle");
        assert_eq!(record.make, "FORD");
    }

    #[tokio::test]
    async fn malformed_fixture_file_is_reported() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("mot.json");
        fs::write(&path, "{ not a list").expect("write fixture");

        let mut config = AppConfig::default();
        config.mot.fixture_path = Some(path);
        let result = bootstrap_with_config(config).await;

        assert!(matches!(result, Err(BootstrapError::FixtureParse { .. })));
    }
}
