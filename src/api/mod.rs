pub mod auth;
pub mod dto;
pub mod errors;
pub mod handlers;
pub mod validation;

use axum::{
    extract::Request,
    http::{header, HeaderValue},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    commands::CommandService, config::Config, store::SharedStore, timestamp::DeviceZone,
};

use auth::ApiKey;
use handlers::ApiDoc;

/// Everything a handler may need, cloned into each request.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub commands: CommandService,
    pub zone: DeviceZone,
    pub api_key: ApiKey,
    pub dispense_window: chrono::Duration,
    pub history_limit: i64,
}

impl AppState {
    pub fn new(store: SharedStore, config: &Config) -> Self {
        let commands = CommandService::new(
            store.clone(),
            config.device_zone,
            config.command_ttl,
            config.command_sweep_interval,
        );
        Self {
            store,
            commands,
            zone: config.device_zone,
            api_key: ApiKey::new(&config.api_key),
            dispense_window: config.dispense_window,
            history_limit: config.history_limit,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let (public, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/api/get-dht", get(handlers::query::get_dht))
        .route("/api/get-dht-history", get(handlers::query::get_dht_history))
        .route("/api/get-infrared", get(handlers::query::get_infrared))
        .route("/api/get-servo-log", get(handlers::query::get_servo_log))
        .route(
            "/api/servo",
            get(handlers::command::get_servo).post(handlers::command::post_servo),
        )
        .with_state(state.clone())
        .split_for_parts();

    // Device-facing routes: everything here needs the shared secret.
    let device = Router::new()
        .route("/api/send-dht", post(handlers::ingest::send_dht))
        .route("/api/send-infrared", post(handlers::ingest::send_infrared))
        .route("/api/send-servo", post(handlers::ingest::send_servo))
        .route("/api/trigger-servo", post(handlers::command::trigger_servo))
        .route("/api/servo-status", get(handlers::command::servo_status))
        .route("/api/servo-executed", post(handlers::command::servo_executed))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ))
        .with_state(state.clone());

    let api_routes = public
        .merge(device)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate, proxy-revalidate"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::EXPIRES,
            HeaderValue::from_static("0"),
        ));

    let system = Router::new()
        .route("/health", get(handlers::health))
        .with_state(state);

    Router::new()
        .merge(api_routes)
        .merge(system)
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .fallback(handlers::not_found)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::span!(
                    Level::INFO,
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
}
