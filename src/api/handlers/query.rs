use axum::{
    extract::State,
    Json,
};
use chrono::{DateTime, Utc};

use crate::{
    api::{
        dto::{CurrentClimateDto, HistoryEntryDto, HistoryParams, HistoryResponse, InfraredDto, ServoLogEntryDto},
        errors::AppError,
        validation::ValidQuery,
        AppState,
    },
    db::models::HistoryQuery,
};

/// Upper bound for `?limit=` on history queries.
const MAX_HISTORY_LIMIT: i64 = 500;

/// Latest temperature/humidity reading, or `null` when there is none.
#[utoipa::path(
    get,
    path = "/api/get-dht",
    responses(
        (status = 200, description = "Latest climate reading", body = Option<CurrentClimateDto>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "queries"
)]
pub async fn get_dht(
    State(state): State<AppState>,
) -> Result<Json<Option<CurrentClimateDto>>, AppError> {
    let latest = state.store.latest_climate().await?;

    Ok(Json(latest.and_then(|r| {
        let ts = r.recorded_at?;
        Some(CurrentClimateDto {
            temperatura: r.temperature,
            humedad: r.humidity,
            fecha_hora: state.zone.display(ts),
        })
    })))
}

/// The newest readings for the chart, returned oldest first.
///
/// Without parameters this is the last `HISTORY_LIMIT` readings across all
/// days. `day` restricts to one day bucket, `from`/`to` to a time range.
#[utoipa::path(
    get,
    path = "/api/get-dht-history",
    params(HistoryParams),
    responses(
        (status = 200, description = "Climate history, chronological", body = HistoryResponse),
        (status = 400, description = "Malformed query parameter"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "queries"
)]
pub async fn get_dht_history(
    State(state): State<AppState>,
    ValidQuery(params): ValidQuery<HistoryParams>,
) -> Result<Json<HistoryResponse>, AppError> {
    let limit = params
        .limit
        .unwrap_or(state.history_limit)
        .clamp(1, MAX_HISTORY_LIMIT);

    let rows = state
        .store
        .climate_history(&HistoryQuery {
            day: params.day,
            from: params.from,
            to: params.to,
            limit,
        })
        .await?;

    let mut data: Vec<HistoryEntryDto> = rows
        .into_iter()
        .filter_map(|r| {
            let ts = r.recorded_at?;
            Some(HistoryEntryDto {
                temperatura: r.temperature,
                humedad: r.humidity,
                fecha_hora: state.zone.display(ts),
                hora: state.zone.time_of_day(ts),
                dia: r.day_bucket,
                timestamp: ts,
            })
        })
        .collect();
    data.reverse();

    Ok(Json(HistoryResponse { data }))
}

/// Latest infrared reading, or `null` when there is none.
#[utoipa::path(
    get,
    path = "/api/get-infrared",
    responses(
        (status = 200, description = "Latest infrared reading", body = Option<InfraredDto>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "queries"
)]
pub async fn get_infrared(
    State(state): State<AppState>,
) -> Result<Json<Option<InfraredDto>>, AppError> {
    let latest = state.store.latest_presence().await?;

    Ok(Json(latest.map(|r| InfraredDto {
        estado: r.available,
        fecha_hora: state.zone.display(r.recorded_at),
    })))
}

/// Dispenser open/close events, newest first.
///
/// Only openings are stored; each one is paired with a synthesized closing
/// event one dispense window later.
#[utoipa::path(
    get,
    path = "/api/get-servo-log",
    responses(
        (status = 200, description = "Dispenser events", body = Vec<ServoLogEntryDto>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "queries"
)]
pub async fn get_servo_log(
    State(state): State<AppState>,
) -> Result<Json<Vec<ServoLogEntryDto>>, AppError> {
    let activations = state.store.recent_activations(state.history_limit).await?;

    let mut events: Vec<(DateTime<Utc>, bool)> = activations
        .iter()
        .flat_map(|a| {
            let closed = a
                .activated_at
                .checked_add_signed(state.dispense_window)
                .map(|at| (at, false));
            std::iter::once((a.activated_at, true)).chain(closed)
        })
        .collect();
    // Newest first; at equal instants the opening is the later event.
    events.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
    events.truncate(state.history_limit.max(0) as usize);

    Ok(Json(
        events
            .into_iter()
            .map(|(ts, status)| ServoLogEntryDto {
                timestamp: state.zone.display(ts),
                status,
            })
            .collect(),
    ))
}
