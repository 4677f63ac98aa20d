pub mod command;
pub mod ingest;
pub mod query;

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::warn;
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};

use super::{
    auth::API_KEY_HEADER,
    dto::{
        CurrentClimateDto, DhtPayload, ExecutedPayload, ExecutedResponse, HistoryEntryDto,
        HistoryResponse, InfraredDto, InfraredPayload, ServoActivatedDto, ServoLogEntryDto,
        ServoPayload, ServoStateDto, ServoStatusDto, SuccessResponse, TriggerResponse,
    },
    errors::AppError,
    validation::Issue,
    AppState,
};

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the store answers.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Store unreachable"),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Fallbacks
// ---------------------------------------------------------------------------

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

pub async fn not_found() -> AppError {
    AppError::NotFound
}

// ---------------------------------------------------------------------------
// OpenAPI document
// ---------------------------------------------------------------------------

struct ApiKeyScheme;

impl Modify for ApiKeyScheme {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(API_KEY_HEADER))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        ingest::send_dht,
        ingest::send_infrared,
        ingest::send_servo,
        query::get_dht,
        query::get_dht_history,
        query::get_infrared,
        query::get_servo_log,
        command::get_servo,
        command::post_servo,
        command::trigger_servo,
        command::servo_status,
        command::servo_executed,
        health,
    ),
    components(schemas(
        DhtPayload,
        InfraredPayload,
        ServoPayload,
        ExecutedPayload,
        SuccessResponse,
        CurrentClimateDto,
        HistoryEntryDto,
        HistoryResponse,
        InfraredDto,
        ServoLogEntryDto,
        ServoStateDto,
        ServoActivatedDto,
        TriggerResponse,
        ServoStatusDto,
        ExecutedResponse,
        Issue,
    )),
    modifiers(&ApiKeyScheme),
    tags(
        (name = "ingestion", description = "Sensor reports from the device"),
        (name = "queries",   description = "Dashboard reads"),
        (name = "dispenser", description = "Dashboard dispenser button"),
        (name = "commands",  description = "Dashboard to device command mailbox"),
        (name = "system",    description = "System endpoints"),
    ),
    info(
        title = "PetCare Monitor API",
        version = "0.1.0",
        description = "Sensor ingestion, dashboard queries and dispenser commands"
    )
)]
pub struct ApiDoc;
