use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use warrantly_core::{
    check_eligibility,
    config::PricingConfig,
    pricing::addons::{add_on_quote, parse_selections, PaymentTerm},
    score_reliability, AddOnQuote, ApplicationError, DomainError, EligibilityResult,
    InterfaceError, MotTestRecord, QuoteOutcome, QuoteRequest, QuoteRuntime, ReliabilityResult,
};

use crate::mot::MotHistoryProvider;

#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<dyn QuoteRuntime>,
    pub mot: Arc<dyn MotHistoryProvider>,
    pub pricing: PricingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<()>>)>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityRequest {
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub manufacture_year: Option<i32>,
    #[serde(default)]
    pub mot_history: Vec<MotTestRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOnPriceRequest {
    #[serde(default)]
    pub payment_term: Option<String>,
    #[serde(default)]
    pub add_ons: BTreeMap<String, bool>,
    #[serde(default)]
    pub duration_months: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReliabilityRequest {
    pub registration: String,
    #[serde(default)]
    pub mileage: Option<u32>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/eligibility", post(eligibility))
        .route("/api/quote", post(quote))
        .route("/api/add-ons/price", post(add_on_price))
        .route("/api/reliability-score", post(reliability_score))
        .with_state(state)
}

fn correlation_id() -> String {
    Uuid::new_v4().to_string()
}

fn success<T>(data: T, correlation_id: &str) -> ApiResult<T> {
    Ok(Json(ApiResponse {
        success: true,
        data: Some(data),
        error: None,
        correlation_id: Some(correlation_id.to_string()),
    }))
}

fn failure(error: InterfaceError) -> (StatusCode, Json<ApiResponse<()>>) {
    let (status, message) = match &error {
        InterfaceError::BadRequest { message, .. } => {
            (StatusCode::BAD_REQUEST, format!("{} ({message})", error.user_message()))
        }
        InterfaceError::NotFound { .. } => (StatusCode::NOT_FOUND, error.user_message().to_string()),
        InterfaceError::ServiceUnavailable { .. } => {
            (StatusCode::BAD_GATEWAY, error.user_message().to_string())
        }
        InterfaceError::Internal { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, error.user_message().to_string())
        }
    };

    warn!(
        event_name = "api.request.failed",
        correlation_id = %error.correlation_id(),
        status = status.as_u16(),
        error = %error,
        "request failed"
    );

    (
        status,
        Json(ApiResponse {
            success: false,
            data: None,
            error: Some(message),
            correlation_id: Some(error.correlation_id().to_string()),
        }),
    )
}

fn decode<T>(
    payload: Result<Json<T>, JsonRejection>,
    correlation_id: &str,
) -> Result<T, (StatusCode, Json<ApiResponse<()>>)> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        failure(
            ApplicationError::from(DomainError::InvariantViolation(rejection.body_text()))
                .into_interface(correlation_id),
        )
    })
}

async fn eligibility(
    State(state): State<AppState>,
    payload: Result<Json<EligibilityRequest>, JsonRejection>,
) -> ApiResult<EligibilityResult> {
    let correlation_id = correlation_id();
    let request = decode(payload, &correlation_id)?;

    let result = check_eligibility(
        &request.make,
        &request.model,
        request.manufacture_year,
        Some(request.mot_history.as_slice()),
        state.pricing.reference_year(),
    );
    info!(
        event_name = "api.eligibility.checked",
        correlation_id = %correlation_id,
        blocked = result.blocked,
        "eligibility checked"
    );
    success(result, &correlation_id)
}

async fn quote(
    State(state): State<AppState>,
    payload: Result<Json<QuoteRequest>, JsonRejection>,
) -> ApiResult<QuoteOutcome> {
    let correlation_id = correlation_id();
    let request = decode(payload, &correlation_id)?;

    let outcome = state
        .runtime
        .quote(&request, state.pricing.reference_date())
        .map_err(|error| failure(ApplicationError::from(error).into_interface(&correlation_id)))?;
    info!(
        event_name = "api.quote.priced",
        correlation_id = %correlation_id,
        fingerprint = %outcome.fingerprint,
        blocked = outcome.eligibility.blocked,
        "quote priced"
    );
    success(outcome, &correlation_id)
}

async fn add_on_price(
    payload: Result<Json<AddOnPriceRequest>, JsonRejection>,
) -> ApiResult<AddOnQuote> {
    let correlation_id = correlation_id();
    let request = decode(payload, &correlation_id)?;

    let term = request.payment_term.as_deref().map(PaymentTerm::normalize).unwrap_or_default();
    let duration_months = request.duration_months.unwrap_or_else(|| term.months());
    let quote = add_on_quote(&parse_selections(&request.add_ons), term, duration_months);
    success(quote, &correlation_id)
}

async fn reliability_score(
    State(state): State<AppState>,
    payload: Result<Json<ReliabilityRequest>, JsonRejection>,
) -> ApiResult<ReliabilityResult> {
    let correlation_id = correlation_id();
    let request = decode(payload, &correlation_id)?;

    let record = state.mot.fetch(&request.registration).await.map_err(|error| {
        failure(ApplicationError::from(error).into_interface(&correlation_id))
    })?;

    let result = score_reliability(
        &record.mot_tests,
        record.manufacture_date,
        request.mileage,
        state.pricing.reference_date(),
    );
    info!(
        event_name = "api.reliability.scored",
        correlation_id = %correlation_id,
        score = result.score,
        tier = result.tier,
        "reliability scored"
    );
    success(result, &correlation_id)
}
