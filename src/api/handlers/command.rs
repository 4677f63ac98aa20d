use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::{
    api::{
        dto::{
            ExecutedPayload, ExecutedResponse, ServoActivatedDto, ServoStateDto, ServoStatusDto,
            TriggerResponse,
        },
        errors::AppError,
        validation::ValidJson,
        AppState,
    },
    commands::{Acknowledgement, IgnoredAck},
    db::models::{ActivationSource, NewActivation},
};

// ---------------------------------------------------------------------------
// Dashboard dispenser button
// ---------------------------------------------------------------------------

/// Whether the dispenser is open right now, derived from the latest activation.
#[utoipa::path(
    get,
    path = "/api/servo",
    responses(
        (status = 200, description = "Dispenser state", body = ServoStateDto),
        (status = 500, description = "Internal server error"),
    ),
    tag = "dispenser"
)]
pub async fn get_servo(State(state): State<AppState>) -> Result<Json<ServoStateDto>, AppError> {
    let latest = state.store.latest_activation().await?;
    let now = Utc::now();

    Ok(Json(ServoStateDto {
        status: latest
            .as_ref()
            .is_some_and(|a| is_active(a.activated_at, now, state.dispense_window)),
        activated_at: latest.map(|a| a.activated_at),
    }))
}

/// Record a dispenser activation requested from the dashboard. Any body is ignored.
#[utoipa::path(
    post,
    path = "/api/servo",
    responses(
        (status = 200, description = "Activation recorded", body = ServoActivatedDto),
        (status = 500, description = "Internal server error"),
    ),
    tag = "dispenser"
)]
pub async fn post_servo(State(state): State<AppState>) -> Result<Json<ServoActivatedDto>, AppError> {
    let now = Utc::now();
    let activation = state
        .store
        .insert_activation(NewActivation {
            day_bucket: state.zone.day_of(now),
            activated_at: now,
            raw_timestamp: None,
            source: ActivationSource::Dashboard,
            processed: false,
        })
        .await?;

    info!(id = %activation.id, "Dispenser activated from dashboard");
    Ok(Json(ServoActivatedDto {
        success: true,
        status: true,
        activated_at: activation.activated_at,
    }))
}

/// An activation counts as active for `window` after it happened. Device
/// clocks running up to one window ahead of ours are tolerated.
pub(crate) fn is_active(activated_at: DateTime<Utc>, now: DateTime<Utc>, window: chrono::Duration) -> bool {
    let age = now.signed_duration_since(activated_at);
    age < window && age > -window
}

// ---------------------------------------------------------------------------
// Command mailbox
// ---------------------------------------------------------------------------

/// Queue a dispense command for the device to pick up.
#[utoipa::path(
    post,
    path = "/api/trigger-servo",
    responses(
        (status = 200, description = "Command pending", body = TriggerResponse),
        (status = 401, description = "Missing or wrong API key"),
        (status = 500, description = "Internal server error"),
    ),
    security(("api_key" = [])),
    tag = "commands"
)]
pub async fn trigger_servo(State(state): State<AppState>) -> Result<Json<TriggerResponse>, AppError> {
    let command = state.commands.trigger("dashboard", Utc::now()).await?;

    Ok(Json(TriggerResponse {
        success: true,
        message: "Command sent to device".to_owned(),
        command_id: command.version,
    }))
}

/// Polled by the device: should it dispense now?
#[utoipa::path(
    get,
    path = "/api/servo-status",
    responses(
        (status = 200, description = "Pending command state", body = ServoStatusDto),
        (status = 401, description = "Missing or wrong API key"),
        (status = 500, description = "Internal server error"),
    ),
    security(("api_key" = [])),
    tag = "commands"
)]
pub async fn servo_status(State(state): State<AppState>) -> Result<Json<ServoStatusDto>, AppError> {
    let status = state.commands.status(Utc::now()).await?;

    Ok(Json(ServoStatusDto {
        activate: status.activate,
        command_id: status.version,
    }))
}

/// Device acknowledgement that the pending command was carried out.
///
/// Repeated or stale acknowledgements succeed with `applied: false`.
#[utoipa::path(
    post,
    path = "/api/servo-executed",
    request_body = ExecutedPayload,
    responses(
        (status = 200, description = "Acknowledgement processed", body = ExecutedResponse),
        (status = 400, description = "`executed` missing or not true"),
        (status = 401, description = "Missing or wrong API key"),
        (status = 500, description = "Internal server error"),
    ),
    security(("api_key" = [])),
    tag = "commands"
)]
pub async fn servo_executed(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<ExecutedPayload>,
) -> Result<Json<ExecutedResponse>, AppError> {
    let ack = state
        .commands
        .acknowledge(payload.command_id, Utc::now())
        .await?;

    let (applied, message) = match ack {
        Acknowledgement::Applied(_) => (true, "Execution confirmed"),
        Acknowledgement::Ignored(IgnoredAck::NoCommand) => (false, "No command to acknowledge"),
        Acknowledgement::Ignored(IgnoredAck::VersionMismatch) => (false, "Command was superseded"),
        Acknowledgement::Ignored(IgnoredAck::AlreadyExecuted) => (false, "Command already executed"),
        Acknowledgement::Ignored(IgnoredAck::Expired) => (false, "Command expired"),
    };

    Ok(Json(ExecutedResponse {
        success: true,
        applied,
        message: message.to_owned(),
    }))
}
