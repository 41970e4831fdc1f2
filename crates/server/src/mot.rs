//! MOT history lookups by registration.
//!
//! Providers return the upstream [`VehicleRecord`] for a normalized registration.
//! [`CachedMotHistory`] wraps any provider with a TTL cache and serializes concurrent
//! fetches for the same registration so the upstream is hit once per miss.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;
use warrantly_core::{normalize_registration, ApplicationError, DomainError, VehicleRecord};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MotProviderError {
    #[error("registration must not be empty")]
    InvalidRegistration,
    #[error("no MOT history for `{0}`")]
    NotFound(String),
    #[error("MOT history request failed: {0}")]
    Transport(String),
    #[error("MOT history service returned status {0}")]
    UpstreamStatus(u16),
    #[error("MOT history response could not be decoded: {0}")]
    Decode(String),
}

impl From<MotProviderError> for ApplicationError {
    fn from(value: MotProviderError) -> Self {
        match value {
            MotProviderError::InvalidRegistration => {
                Self::Domain(DomainError::InvariantViolation(value.to_string()))
            }
            MotProviderError::NotFound(registration) => Self::VehicleNotFound(registration),
            other => Self::Integration(other.to_string()),
        }
    }
}

#[async_trait]
pub trait MotHistoryProvider: Send + Sync {
    async fn fetch(&self, registration: &str) -> Result<VehicleRecord, MotProviderError>;

    fn name(&self) -> &'static str;
}

fn lookup_key(registration: &str) -> Result<String, MotProviderError> {
    let key = normalize_registration(registration);
    if key.is_empty() {
        return Err(MotProviderError::InvalidRegistration);
    }
    Ok(key)
}

#[derive(Clone, Debug, Default)]
pub struct FixtureMotHistory {
    records: HashMap<String, VehicleRecord>,
}

impl FixtureMotHistory {
    pub fn new(records: impl IntoIterator<Item = VehicleRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (normalize_registration(&record.registration), record))
            .collect();
        Self { records }
    }

    /// Parses a JSON array of vehicle records.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let records: Vec<VehicleRecord> = serde_json::from_str(raw)?;
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl MotHistoryProvider for FixtureMotHistory {
    async fn fetch(&self, registration: &str) -> Result<VehicleRecord, MotProviderError> {
        let key = lookup_key(registration)?;
        self.records.get(&key).cloned().ok_or(MotProviderError::NotFound(key))
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

pub struct HttpMotHistory {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UpstreamPayload {
    One(VehicleRecord),
    Many(Vec<VehicleRecord>),
}

impl HttpMotHistory {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, MotProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| MotProviderError::Transport(error.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url, api_key })
    }
}

#[async_trait]
impl MotHistoryProvider for HttpMotHistory {
    async fn fetch(&self, registration: &str) -> Result<VehicleRecord, MotProviderError> {
        let key = lookup_key(registration)?;
        let url = format!("{}/registration/{key}", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|error| MotProviderError::Transport(error.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(MotProviderError::NotFound(key));
        }
        if !response.status().is_success() {
            return Err(MotProviderError::UpstreamStatus(response.status().as_u16()));
        }

        let payload: UpstreamPayload = response
            .json()
            .await
            .map_err(|error| MotProviderError::Decode(error.to_string()))?;
        let mut record = match payload {
            UpstreamPayload::One(record) => record,
            UpstreamPayload::Many(records) => {
                records.into_iter().next().ok_or_else(|| MotProviderError::NotFound(key.clone()))?
            }
        };
        if record.registration.trim().is_empty() {
            record.registration = key;
        }
        Ok(record)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

struct CacheEntry {
    record: VehicleRecord,
    fetched_at: Instant,
}

pub struct CachedMotHistory<P> {
    inner: P,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<P> CachedMotHistory<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    async fn cached(&self, key: &str) -> Option<VehicleRecord> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.fetched_at.elapsed() < self.ttl => Some(entry.record.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl<P> MotHistoryProvider for CachedMotHistory<P>
where
    P: MotHistoryProvider,
{
    async fn fetch(&self, registration: &str) -> Result<VehicleRecord, MotProviderError> {
        let key = lookup_key(registration)?;
        if let Some(record) = self.cached(&key).await {
            debug!(event_name = "mot.cache.hit", registration = %key, "served MOT history from cache");
            return Ok(record);
        }

        let gate = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight.entry(key.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        let _permit = gate.lock().await;

        // a caller holding the gate before us may have filled the cache
        if let Some(record) = self.cached(&key).await {
            return Ok(record);
        }

        debug!(
            event_name = "mot.cache.miss",
            registration = %key,
            provider = self.inner.name(),
            "fetching MOT history"
        );
        let record = self.inner.fetch(&key).await?;
        self.entries
            .lock()
            .await
            .insert(key, CacheEntry { record: record.clone(), fetched_at: Instant::now() });
        Ok(record)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use warrantly_core::{ApplicationError, VehicleRecord};

    use super::{CachedMotHistory, FixtureMotHistory, MotHistoryProvider, MotProviderError};

    fn vehicle(registration: &str) -> VehicleRecord {
        serde_json::from_value(serde_json::json!({
            "registration": registration,
            "make": "FORD",
            "model": "FIESTA",
            "motTests": [{"completedDate": "2024-02-01", "testResult": "PASSED"}]
        }))
        .expect("fixture vehicle")
    }

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MotHistoryProvider for CountingProvider {
        async fn fetch(&self, registration: &str) -> Result<VehicleRecord, MotProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if registration == "MISSING" {
                return Err(MotProviderError::NotFound(registration.to_string()));
            }
            Ok(vehicle(registration))
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn fixture_lookup_normalizes_registration() {
        let provider = FixtureMotHistory::new([vehicle("AB12 CDE")]);

        let record = provider.fetch("ab12cde").await.expect("registered vehicle");
        assert_eq!(record.make, "FORD");

        let missing = provider.fetch("ZZ99ZZZ").await;
        assert_eq!(missing, Err(MotProviderError::NotFound("ZZ99ZZZ".to_string())));
        assert_eq!(provider.fetch("   ").await, Err(MotProviderError::InvalidRegistration));
    }

    #[tokio::test]
    async fn fixture_loads_from_json_array() {
        let provider = FixtureMotHistory::from_json(
            r#"[{"registration": "AB12CDE", "make": "VAUXHALL", "model": "ASTRA"}]"#,
        )
        .expect("fixture json");
        assert_eq!(provider.len(), 1);
        assert!(provider.fetch("AB12 CDE").await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_fetches_for_one_registration_hit_upstream_once() {
        let cache = Arc::new(CachedMotHistory::new(
            CountingProvider { calls: AtomicUsize::new(0) },
            Duration::from_secs(60),
        ));

        let mut handles = Vec::new();
        for registration in ["AB12CDE", "ab12 cde", "AB12CDE", "Ab12Cde"] {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.fetch(registration).await }));
        }
        for handle in handles {
            let record = handle.await.expect("task joins").expect("fetch succeeds");
            assert_eq!(record.registration, "AB12CDE");
        }

        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entries_and_failures_are_refetched() {
        let cache =
            CachedMotHistory::new(CountingProvider { calls: AtomicUsize::new(0) }, Duration::ZERO);

        cache.fetch("AB12CDE").await.expect("first fetch");
        cache.fetch("AB12CDE").await.expect("second fetch");
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 2);

        assert!(cache.fetch("missing").await.is_err());
        assert!(cache.fetch("missing").await.is_err());
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn provider_errors_map_to_application_errors() {
        assert!(matches!(
            ApplicationError::from(MotProviderError::NotFound("AB12CDE".to_string())),
            ApplicationError::VehicleNotFound(_)
        ));
        assert!(matches!(
            ApplicationError::from(MotProviderError::UpstreamStatus(503)),
            ApplicationError::Integration(_)
        ));
        assert!(matches!(
            ApplicationError::from(MotProviderError::InvalidRegistration),
            ApplicationError::Domain(_)
        ));
    }
}
