//! Integration tests for the health check endpoint and general HTTP behaviour.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use chrono::{Duration as ChronoDuration, Utc};
use common::{body_json, get};
use coreflex_api::engine::counter_tick::TickHeartbeat;
use sqlx::PgPool;
use tower::ServiceExt;

#[sqlx::test(migrations = "../db/migrations")]
async fn health_check_returns_ok_with_json(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["db_healthy"], true);
    assert_eq!(json["tick_engine"]["status"], "starting");
    assert_eq!(json["tick_engine"]["interval_ms"], 2000);
    assert!(json["tick_engine"]["last_pass_at"].is_null());
    assert_eq!(json["live_devices"], 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn health_reports_running_tick_engine(pool: PgPool) {
    let heartbeat = Arc::new(TickHeartbeat::default());
    heartbeat.record_pass(Utc::now());
    let app = common::build_test_app_with_heartbeat(pool, heartbeat);

    let json = body_json(get(app, "/health").await).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["tick_engine"]["status"], "running");
    assert_eq!(json["tick_engine"]["passes"], 1);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn stalled_tick_engine_degrades_health(pool: PgPool) {
    let heartbeat = Arc::new(TickHeartbeat::default());
    heartbeat.record_pass(Utc::now() - ChronoDuration::seconds(60));
    let app = common::build_test_app_with_heartbeat(pool, heartbeat);

    let response = get(app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["db_healthy"], true);
    assert_eq!(json["tick_engine"]["status"], "stalled");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn unknown_route_returns_404(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app, "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn response_contains_x_request_id_header(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app, "/health").await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn cors_preflight_allows_dev_origin(pool: PgPool) {
    let app = common::build_test_app(pool);

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/control/write")
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "http://localhost:5173"
    );
}
