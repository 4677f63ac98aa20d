// HTTP-level tests against the router backed by the in-memory store.

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::{TestRequest, TestServer};
use chrono::{Duration, Utc};
use petcare_monitor::{
    api::{router, AppState},
    config::Config,
    db::models::{ActivationSource, NewActivation},
    store::{MemoryStore, SharedStore},
};
use serde_json::{json, Value};

const API_KEY: &str = "test-secret";

fn test_server() -> (TestServer, SharedStore) {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let config = Config::from_lookup(|key: &str| match key {
        "STORE_BACKEND" => Some("memory".to_owned()),
        "IOT_API_KEY" => Some(API_KEY.to_owned()),
        _ => None,
    })
    .unwrap();
    let server = TestServer::new(router(AppState::new(store.clone(), &config))).unwrap();
    (server, store)
}

fn keyed(request: TestRequest) -> TestRequest {
    request.add_header(
        HeaderName::from_static("x-api-key"),
        HeaderValue::from_static(API_KEY),
    )
}

async fn activation_aged(store: &SharedStore, age: Duration) {
    let at = Utc::now() - age;
    store
        .insert_activation(NewActivation {
            day_bucket: at.format("%Y-%m-%d").to_string(),
            activated_at: at,
            raw_timestamp: None,
            source: ActivationSource::Device,
            processed: true,
        })
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dht_reading_shows_up_in_current_and_history() {
    let (server, _) = test_server();

    let resp = keyed(server.post("/api/send-dht"))
        .json(&json!({
            "temperatura": 22.5,
            "humedad": 60,
            "fechaHora": "15/03/2024 09:30:00"
        }))
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<Value>(), json!({ "success": true }));

    let current: Value = server.get("/api/get-dht").await.json();
    assert_eq!(current["temperatura"], 22.5);
    assert_eq!(current["humedad"], 60.0);
    assert_eq!(current["fechaHora"], "15/03/2024 09:30:00");

    let history: Value = server.get("/api/get-dht-history").await.json();
    let data = history["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["hora"], "09:30");
    assert_eq!(data[0]["dia"], "2024-03-15");
    assert_eq!(data[0]["timestamp"], "2024-03-15T09:30:00Z");
}

#[tokio::test]
async fn history_is_chronological_and_filters_by_day() {
    let (server, _) = test_server();

    for (temp, ts) in [
        (20.0, "01/02/2024 10:00:00"),
        (21.0, "31/01/2024 23:59:00"),
        (22.0, "01/02/2024 11:00:00"),
    ] {
        keyed(server.post("/api/send-dht"))
            .json(&json!({ "temperatura": temp, "humedad": 50, "fechaHora": ts }))
            .await
            .assert_status_ok();
    }

    let all: Value = server.get("/api/get-dht-history").await.json();
    let temps: Vec<f64> = all["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["temperatura"].as_f64().unwrap())
        .collect();
    assert_eq!(temps, vec![21.0, 20.0, 22.0]);

    let day: Value = server
        .get("/api/get-dht-history")
        .add_query_param("day", "2024-02-01")
        .await
        .json();
    let data = day["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert!(data.iter().all(|e| e["dia"] == "2024-02-01"));

    let limited: Value = server
        .get("/api/get-dht-history")
        .add_query_param("limit", "1")
        .await
        .json();
    assert_eq!(limited["data"][0]["temperatura"], 22.0);
}

#[tokio::test]
async fn history_rejects_malformed_query_parameters() {
    let (server, _) = test_server();

    let resp = server
        .get("/api/get-dht-history")
        .add_query_param("limit", "abc")
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"], "invalid payload");
    assert_eq!(
        body["issues"],
        json!([{ "path": "limit", "message": "Expected integer" }])
    );

    let resp = server
        .get("/api/get-dht-history")
        .add_query_param("from", "yesterday")
        .add_query_param("limit", "10")
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"], "invalid payload");
    assert_eq!(
        body["issues"],
        json!([{ "path": "from", "message": "Expected RFC 3339 date-time" }])
    );

    server
        .get("/api/get-dht-history")
        .add_query_param("from", "2024-02-01T00:00:00Z")
        .add_query_param("limit", "10")
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn infrared_reading_is_reported() {
    let (server, _) = test_server();

    keyed(server.post("/api/send-infrared"))
        .json(&json!({ "disponibilidad": true }))
        .await
        .assert_status_ok();

    let body: Value = server.get("/api/get-infrared").await.json();
    assert_eq!(body["estado"], true);
    assert!(body["fechaHora"].is_string());
}

#[tokio::test]
async fn device_servo_report_is_logged_with_close_event() {
    let (server, _) = test_server();

    keyed(server.post("/api/send-servo"))
        .json(&json!({ "fechaHoraAccionado": "15/03/2024 08:00:00" }))
        .await
        .assert_status_ok();

    let log: Vec<Value> = server.get("/api/get-servo-log").await.json();
    assert_eq!(
        log,
        vec![
            json!({ "timestamp": "15/03/2024 08:00:05", "status": false }),
            json!({ "timestamp": "15/03/2024 08:00:00", "status": true }),
        ]
    );
}

#[tokio::test]
async fn unparseable_servo_time_is_rejected() {
    let (server, _) = test_server();

    let resp = keyed(server.post("/api/send-servo"))
        .json(&json!({ "fechaHoraAccionado": "yesterday" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["issues"][0]["path"], "fechaHoraAccionado");
}

// ---------------------------------------------------------------------------
// Authentication and validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_or_wrong_key_is_rejected_and_nothing_stored() {
    let (server, _) = test_server();
    let body = json!({ "temperatura": 22.5, "humedad": 60, "fechaHora": "15/03/2024 09:30:00" });

    let resp = server.post("/api/send-dht").json(&body).await;
    resp.assert_status(StatusCode::UNAUTHORIZED);

    let resp = server
        .post("/api/send-dht")
        .add_header(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_static("wrong"),
        )
        .json(&body)
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);

    server.get("/api/trigger-servo").await.assert_status(StatusCode::METHOD_NOT_ALLOWED);
    server.post("/api/trigger-servo").await.assert_status(StatusCode::UNAUTHORIZED);
    server.get("/api/servo-status").await.assert_status(StatusCode::UNAUTHORIZED);

    let current: Value = server.get("/api/get-dht").await.json();
    assert!(current.is_null());
}

#[tokio::test]
async fn invalid_payload_lists_every_issue() {
    let (server, _) = test_server();

    let resp = keyed(server.post("/api/send-dht"))
        .json(&json!({ "temperatura": "22" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    let paths: Vec<&str> = body["issues"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["path"].as_str().unwrap())
        .collect();
    assert_eq!(paths, vec!["temperatura", "humedad", "fechaHora"]);

    let resp = keyed(server.post("/api/send-infrared")).text("{not json").await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let current: Value = server.get("/api/get-dht").await.json();
    assert!(current.is_null());
}

#[tokio::test]
async fn oversized_body_is_payload_too_large() {
    let (server, _) = test_server();

    let resp = keyed(server.post("/api/send-dht"))
        .text("x".repeat(3 * 1024 * 1024))
        .await;
    resp.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(resp.json::<Value>()["error"], "payload too large");

    let current: Value = server.get("/api/get-dht").await.json();
    assert!(current.is_null());
}

#[tokio::test]
async fn wrong_method_and_unknown_path() {
    let (server, _) = test_server();

    server.get("/api/send-dht").await.assert_status(StatusCode::METHOD_NOT_ALLOWED);
    server.post("/api/get-dht").await.assert_status(StatusCode::METHOD_NOT_ALLOWED);
    server.delete("/api/servo").await.assert_status(StatusCode::METHOD_NOT_ALLOWED);
    server.get("/api/nope").await.assert_status(StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_store_gives_empty_answers() {
    let (server, _) = test_server();

    let resp = server.get("/api/get-dht").await;
    resp.assert_status_ok();
    assert!(resp.json::<Value>().is_null());

    let history: Value = server.get("/api/get-dht-history").await.json();
    assert_eq!(history, json!({ "data": [] }));

    assert!(server.get("/api/get-infrared").await.json::<Value>().is_null());
    assert_eq!(server.get("/api/get-servo-log").await.json::<Value>(), json!([]));

    let servo: Value = server.get("/api/servo").await.json();
    assert_eq!(servo, json!({ "status": false, "activatedAt": null }));
}

#[tokio::test]
async fn repeated_reads_are_identical() {
    let (server, _) = test_server();
    keyed(server.post("/api/send-dht"))
        .json(&json!({ "temperatura": 18, "humedad": 40, "fechaHora": "15/03/2024 07:00:00" }))
        .await
        .assert_status_ok();

    let first: Value = server.get("/api/get-dht-history").await.json();
    let second: Value = server.get("/api/get-dht-history").await.json();
    assert_eq!(first, second);
}

#[tokio::test]
async fn responses_are_not_cacheable() {
    let (server, _) = test_server();

    let resp = server.get("/api/get-dht").await;
    let cache_control = resp.header("cache-control");
    assert!(cache_control.to_str().unwrap().contains("no-store"));
    assert_eq!(resp.header("pragma"), "no-cache");
    assert_eq!(resp.header("expires"), "0");

    let resp = keyed(server.get("/api/servo-status")).await;
    assert!(resp.header("cache-control").to_str().unwrap().contains("no-cache"));
}

// ---------------------------------------------------------------------------
// Dispenser
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dispenser_is_open_only_within_window() {
    let (server, store) = test_server();

    activation_aged(&store, Duration::seconds(6)).await;
    let servo: Value = server.get("/api/servo").await.json();
    assert_eq!(servo["status"], false);
    assert!(servo["activatedAt"].is_string());

    activation_aged(&store, Duration::seconds(2)).await;
    let servo: Value = server.get("/api/servo").await.json();
    assert_eq!(servo["status"], true);
}

#[tokio::test]
async fn dashboard_click_opens_dispenser() {
    let (server, _) = test_server();

    let resp = server.post("/api/servo").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], true);

    let servo: Value = server.get("/api/servo").await.json();
    assert_eq!(servo["status"], true);
    assert_eq!(servo["activatedAt"], body["activatedAt"]);
}

#[tokio::test]
async fn command_handshake() {
    let (server, _) = test_server();

    let idle: Value = keyed(server.get("/api/servo-status")).await.json();
    assert_eq!(idle, json!({ "activate": false, "commandId": null }));

    let trigger: Value = keyed(server.post("/api/trigger-servo")).await.json();
    assert_eq!(trigger["success"], true);
    let id = trigger["commandId"].as_i64().unwrap();

    let pending: Value = keyed(server.get("/api/servo-status")).await.json();
    assert_eq!(pending, json!({ "activate": true, "commandId": id }));

    let ack: Value = keyed(server.post("/api/servo-executed"))
        .json(&json!({ "executed": true, "commandId": id }))
        .await
        .json();
    assert_eq!(ack["success"], true);
    assert_eq!(ack["applied"], true);

    let done: Value = keyed(server.get("/api/servo-status")).await.json();
    assert_eq!(done["activate"], false);

    // A repeated acknowledgement is accepted but changes nothing.
    let again: Value = keyed(server.post("/api/servo-executed"))
        .json(&json!({ "executed": true, "commandId": id }))
        .await
        .json();
    assert_eq!(again["success"], true);
    assert_eq!(again["applied"], false);

    let log: Vec<Value> = server.get("/api/get-servo-log").await.json();
    assert_eq!(log.len(), 2);
    let servo: Value = server.get("/api/servo").await.json();
    assert_eq!(servo["status"], true);
}

#[tokio::test]
async fn retrigger_supersedes_old_command() {
    let (server, _) = test_server();

    let first: Value = keyed(server.post("/api/trigger-servo")).await.json();
    let second: Value = keyed(server.post("/api/trigger-servo")).await.json();
    let (old, new) = (
        first["commandId"].as_i64().unwrap(),
        second["commandId"].as_i64().unwrap(),
    );
    assert!(new > old);

    let stale: Value = keyed(server.post("/api/servo-executed"))
        .json(&json!({ "executed": true, "commandId": old }))
        .await
        .json();
    assert_eq!(stale["applied"], false);

    let status: Value = keyed(server.get("/api/servo-status")).await.json();
    assert_eq!(status, json!({ "activate": true, "commandId": new }));
}

#[tokio::test]
async fn acknowledgement_must_say_executed() {
    let (server, _) = test_server();
    keyed(server.post("/api/trigger-servo")).await.assert_status_ok();

    let resp = keyed(server.post("/api/servo-executed"))
        .json(&json!({ "executed": false }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let status: Value = keyed(server.get("/api/servo-status")).await.json();
    assert_eq!(status["activate"], true);
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_ok() {
    let (server, _) = test_server();
    let resp = server.get("/health").await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<Value>(), json!({ "status": "ok" }));
}

#[tokio::test]
async fn openapi_document_is_served() {
    let (server, _) = test_server();
    let resp = server.get("/api-docs/openapi.json").await;
    resp.assert_status_ok();
    let doc: Value = resp.json();
    assert_eq!(doc["info"]["title"], "PetCare Monitor API");
    assert!(doc["paths"]["/api/send-dht"].is_object());
    assert!(doc["paths"]["/api/servo-executed"].is_object());
    assert!(doc["components"]["securitySchemes"]["api_key"].is_object());
}
