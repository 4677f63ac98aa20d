use axum::{extract::State, Json};
use chrono::Utc;
use tracing::info;

use crate::{
    api::{
        dto::{DhtPayload, InfraredPayload, ServoPayload, SuccessResponse},
        errors::AppError,
        validation::ValidJson,
        AppState,
    },
    db::models::{ActivationSource, NewActivation, NewClimateReading, NewPresenceReading},
    timestamp::day_bucket,
};

/// Record a temperature/humidity reading from the DHT sensor.
///
/// The reading is filed under the day of its `fechaHora` prefix, or under
/// `unknown` when there is none. Readings whose time cannot be parsed are kept
/// but never show up in queries.
#[utoipa::path(
    post,
    path = "/api/send-dht",
    request_body = DhtPayload,
    responses(
        (status = 200, description = "Reading stored", body = SuccessResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Missing or wrong API key"),
        (status = 500, description = "Internal server error"),
    ),
    security(("api_key" = [])),
    tag = "ingestion"
)]
pub async fn send_dht(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<DhtPayload>,
) -> Result<Json<SuccessResponse>, AppError> {
    let reading = state
        .store
        .insert_climate(NewClimateReading {
            day_bucket: day_bucket(&payload.fecha_hora),
            temperature: payload.temperatura,
            humidity: payload.humedad,
            recorded_at: state.zone.parse(&payload.fecha_hora),
            raw_timestamp: payload.fecha_hora,
        })
        .await?;

    info!(
        day = %reading.day_bucket,
        temperature = reading.temperature,
        humidity = reading.humidity,
        parsed = reading.recorded_at.is_some(),
        "Climate reading stored"
    );
    Ok(Json(SuccessResponse::ok()))
}

/// Record the infrared food sensor state, timestamped on arrival.
#[utoipa::path(
    post,
    path = "/api/send-infrared",
    request_body = InfraredPayload,
    responses(
        (status = 200, description = "Reading stored", body = SuccessResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Missing or wrong API key"),
        (status = 500, description = "Internal server error"),
    ),
    security(("api_key" = [])),
    tag = "ingestion"
)]
pub async fn send_infrared(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<InfraredPayload>,
) -> Result<Json<SuccessResponse>, AppError> {
    let now = Utc::now();
    state
        .store
        .insert_presence(NewPresenceReading {
            day_bucket: state.zone.day_of(now),
            available: payload.disponibilidad,
            recorded_at: now,
        })
        .await?;

    info!(available = payload.disponibilidad, "Presence reading stored");
    Ok(Json(SuccessResponse::ok()))
}

/// Record a dispenser activation reported by the device.
#[utoipa::path(
    post,
    path = "/api/send-servo",
    request_body = ServoPayload,
    responses(
        (status = 200, description = "Activation stored", body = SuccessResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Missing or wrong API key"),
        (status = 500, description = "Internal server error"),
    ),
    security(("api_key" = [])),
    tag = "ingestion"
)]
pub async fn send_servo(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<ServoPayload>,
) -> Result<Json<SuccessResponse>, AppError> {
    let raw = payload.fecha_hora_accionado;
    let activated_at = state
        .zone
        .parse(&raw)
        .ok_or_else(|| AppError::invalid("fechaHoraAccionado", "Expected a date"))?;

    state
        .store
        .insert_activation(NewActivation {
            day_bucket: day_bucket(&raw),
            activated_at,
            raw_timestamp: Some(raw),
            source: ActivationSource::Device,
            processed: true,
        })
        .await?;

    info!(activated_at = %activated_at, "Dispenser activation stored");
    Ok(Json(SuccessResponse::ok()))
}
