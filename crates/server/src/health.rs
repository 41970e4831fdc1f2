use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    pub mot_provider: &'static str,
    pub started_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub mot_history: HealthCheck,
    pub uptime_secs: i64,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let now = Utc::now();
    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "warrantly-server pricing runtime initialized".to_string(),
        },
        mot_history: HealthCheck {
            status: "ready",
            detail: format!("`{}` provider configured", state.mot_provider),
        },
        uptime_secs: (now - state.started_at).num_seconds().max(0),
        checked_at: now.to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use chrono::{Duration, Utc};

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_reports_ready_with_provider_name() {
        let state =
            HealthState { mot_provider: "fixture", started_at: Utc::now() - Duration::seconds(30) };

        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.service.status, "ready");
        assert!(payload.mot_history.detail.contains("fixture"));
        assert!(payload.uptime_secs >= 30);
    }
}
