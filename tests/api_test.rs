//! End-to-end tests of the REST surface over the in-memory store and the
//! sample source.

#![allow(clippy::panic, clippy::indexing_slicing)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use apr_gateway::api;
use apr_gateway::app_state::AppState;
use apr_gateway::config::GatewayConfig;
use apr_gateway::persistence::MemoryStore;
use apr_gateway::sources::{SampleSource, YieldSource};
use apr_gateway::ws::handler::ws_handler;

const SECRET: &str = "s3cret";

fn test_app() -> Router {
    let vars: HashMap<&str, &str> = [
        ("PERSISTENCE_ENABLED", "false"),
        ("SYNC_ENABLED", "false"),
        ("SOURCES", "sample"),
        ("CRON_SECRET", SECRET),
    ]
    .into_iter()
    .collect();
    let Ok(config) = GatewayConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_string())) else {
        panic!("config loads");
    };
    let sources = vec![Arc::new(SampleSource::default()) as Arc<dyn YieldSource>];
    let state = AppState::new(&config, Arc::new(MemoryStore::new()), sources);
    api::build_router()
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let Ok(request) = builder.body(body) else {
        panic!("request builds");
    };
    let Ok(response) = app.clone().oneshot(request).await else {
        panic!("router is infallible");
    };
    let status = response.status();
    let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
        panic!("body reads");
    };
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

const ADMIN: [(&str, &str); 1] = [("authorization", "Bearer s3cret")];

#[tokio::test]
async fn health_reports_memory_store() {
    let app = test_app();
    let (status, body) = send(&app, Method::GET, "/health", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "memory");
    assert_eq!(body["scheduler_running"], false);
}

#[tokio::test]
async fn sources_are_listed() {
    let app = test_app();
    let (status, body) = send(&app, Method::GET, "/config/sources", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sources"], json!(["sample"]));
}

#[tokio::test]
async fn live_top_is_sorted_and_limited() {
    let app = test_app();
    let (status, body) = send(&app, Method::GET, "/api/v1/rates/top?limit=3", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    let aprs: Vec<f64> = body["data"]
        .as_array()
        .map(|rows| rows.iter().filter_map(|r| r["apr"].as_f64()).collect())
        .unwrap_or_default();
    assert_eq!(aprs, vec![7.5, 6.0, 5.2]);
}

#[tokio::test]
async fn out_of_range_limit_is_rejected() {
    let app = test_app();
    let (status, body) = send(&app, Method::GET, "/api/v1/rates/top?limit=0", &[], None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1001);

    let (status, _) = send(&app, Method::GET, "/api/v1/rates/top?limit=101", &[], None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn symbol_lookup_is_case_insensitive() {
    let app = test_app();
    let (status, body) = send(&app, Method::GET, "/api/v1/rates/symbol/usdt", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    let Some(rows) = body["data"].as_array() else {
        panic!("data is an array");
    };
    assert!(!rows.is_empty());
    assert!(rows.iter().all(|r| r["asset"] == "USDT"));
}

#[tokio::test]
async fn user_routes_require_user_header() {
    let app = test_app();
    let (status, body) = send(&app, Method::GET, "/api/v1/alerts", &[], None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], 4010);
}

#[tokio::test]
async fn websocket_requires_user_header() {
    let app = test_app();
    let upgrade = [
        ("connection", "upgrade"),
        ("upgrade", "websocket"),
        ("sec-websocket-version", "13"),
        ("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ=="),
    ];
    let (status, body) = send(&app, Method::GET, "/ws", &upgrade, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"]["message"].as_str().unwrap_or("").contains("x-user-id"));
}

#[tokio::test]
async fn alert_lifecycle_is_scoped_to_owner() {
    let app = test_app();
    let alice = [("x-user-id", "alice")];
    let bob = [("x-user-id", "bob")];

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/v1/alerts",
        &alice,
        Some(json!({"asset": "usdt", "platform": "Binance", "alert_type": "above", "threshold": 5.0})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["asset"], "USDT");
    assert_eq!(created["is_active"], true);
    let Some(id) = created["id"].as_str() else {
        panic!("alert has an id");
    };

    let (_, listed) = send(&app, Method::GET, "/api/v1/alerts", &alice, None).await;
    assert_eq!(listed["count"], 1);
    let (_, listed) = send(&app, Method::GET, "/api/v1/alerts", &bob, None).await;
    assert_eq!(listed["count"], 0);

    let uri = format!("/api/v1/alerts/{id}");
    let (status, _) = send(&app, Method::PATCH, &uri, &bob, Some(json!({"is_active": false}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, updated) =
        send(&app, Method::PATCH, &uri, &alice, Some(json!({"is_active": false}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["is_active"], false);

    let (status, _) = send(&app, Method::DELETE, &uri, &alice, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::DELETE, &uri, &alice, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_alert_is_rejected() {
    let app = test_app();
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/alerts",
        &[("x-user-id", "alice")],
        Some(json!({"asset": "", "platform": "Binance", "alert_type": "below", "threshold": 1.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_routes_require_the_secret() {
    let app = test_app();
    let (status, _) = send(&app, Method::POST, "/api/v1/admin/sync", &[], None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong = [("authorization", "Bearer nope")];
    let (status, _) = send(&app, Method::POST, "/api/v1/admin/sync", &wrong, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let header = [("x-cron-secret", SECRET)];
    let (status, _) = send(&app, Method::GET, "/api/v1/admin/scheduler", &header, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn sync_populates_snapshots_history_and_trend() {
    let app = test_app();

    let (status, body) = send(&app, Method::POST, "/api/v1/admin/sync", &ADMIN, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert!(body["report"]["fetched"].as_u64().unwrap_or(0) > 0);

    let (status, latest) =
        send(&app, Method::GET, "/api/v1/rates/latest?symbol=USDT", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["degraded"], false);
    assert!(latest["count"].as_u64().unwrap_or(0) > 0);

    let (status, history) = send(
        &app,
        Method::GET,
        "/api/v1/history?asset=USDT&platform=Binance",
        &[],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["count"], 1);

    // A second cycle inside the same hour updates the point in place.
    let (status, _) = send(&app, Method::POST, "/api/v1/admin/sync", &ADMIN, None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, history) = send(
        &app,
        Method::GET,
        "/api/v1/history?asset=USDT&platform=Binance",
        &[],
        None,
    )
    .await;
    assert_eq!(history["count"], 1);

    let (status, trend) = send(
        &app,
        Method::GET,
        "/api/v1/trend?asset=USDT&platform=Binance",
        &[],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trend["latest_apr"], 5.2);
    assert_eq!(trend["windows"][0]["lookback"], "24h");
    assert_eq!(trend["windows"][0]["direction"], "flat");
}

#[tokio::test]
async fn padded_series_identifiers_match_stored_history() {
    let app = test_app();
    let (status, _) = send(&app, Method::POST, "/api/v1/admin/sync", &ADMIN, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, history) = send(
        &app,
        Method::GET,
        "/api/v1/history?asset=%20usdt%20&platform=Binance%20",
        &[],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["count"], 1);
    assert_eq!(history["asset"], "USDT");
    assert_eq!(history["platform"], "Binance");

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/v1/trend?asset=%20USDT&platform=Binance",
        &[],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn enormous_lookback_is_rejected() {
    let app = test_app();
    let (status, _) = send(&app, Method::POST, "/api/v1/admin/sync", &ADMIN, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/trend?asset=USDT&platform=Binance&lookback=100000000w",
        &[],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap_or("").contains("100000000w"));
}

#[tokio::test]
async fn trend_without_history_is_not_found() {
    let app = test_app();
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/trend?asset=DOGE&platform=Nowhere",
        &[],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], 2003);

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/v1/trend?asset=USDT&platform=Binance&lookback=forever",
        &[],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sync_fires_alerts_into_the_inbox() {
    let app = test_app();
    let alice = [("x-user-id", "alice")];

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/alerts",
        &alice,
        Some(json!({"asset": "USDT", "platform": "Binance", "alert_type": "above", "threshold": 5.0})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send(&app, Method::POST, "/api/v1/admin/sync", &ADMIN, None).await;
    assert_eq!(body["report"]["notifications"], 1);

    // Cooldown suppresses an immediate re-fire.
    let (_, body) = send(&app, Method::POST, "/api/v1/admin/alerts/evaluate", &ADMIN, None).await;
    assert_eq!(body["count"], 0);

    let (status, inbox) = send(&app, Method::GET, "/api/v1/notifications", &alice, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inbox["count"], 1);
    assert_eq!(inbox["unread"], 1);

    let (_, bob_inbox) =
        send(&app, Method::GET, "/api/v1/notifications", &[("x-user-id", "bob")], None).await;
    assert_eq!(bob_inbox["count"], 0);

    let (_, marked) = send(&app, Method::POST, "/api/v1/notifications/read-all", &alice, None).await;
    assert_eq!(marked["updated"], 1);

    let (_, unread) = send(
        &app,
        Method::GET,
        "/api/v1/notifications?unread_only=true",
        &alice,
        None,
    )
    .await;
    assert_eq!(unread["count"], 0);
}

#[tokio::test]
async fn scheduler_start_and_stop_are_idempotent() {
    let app = test_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/admin/scheduler/start",
        &ADMIN,
        Some(json!({"interval_secs": 3600})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], true);
    assert_eq!(body["status"]["running"], true);
    assert_eq!(body["status"]["interval_secs"], 3600);

    let (_, body) = send(&app, Method::POST, "/api/v1/admin/scheduler/start", &ADMIN, None).await;
    assert_eq!(body["changed"], false);

    let (_, body) = send(&app, Method::POST, "/api/v1/admin/scheduler/stop", &ADMIN, None).await;
    assert_eq!(body["changed"], true);
    assert_eq!(body["status"]["running"], false);

    let (_, body) = send(&app, Method::POST, "/api/v1/admin/scheduler/stop", &ADMIN, None).await;
    assert_eq!(body["changed"], false);
}

#[tokio::test]
async fn zero_interval_is_rejected() {
    let app = test_app();
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/admin/scheduler/start",
        &ADMIN,
        Some(json!({"interval_secs": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
