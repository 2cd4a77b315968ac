//! Integration tests for control bindings and lock-guarded output writes.
//!
//! Writes go to a throwaway axum gateway on an ephemeral port so each
//! gateway outcome (ack, reject, timeout) can be staged.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use common::{
    body_json, claimed_device, delete_auth, get_auth, post_json, spawn_gateway, token_for,
    GATEWAY_WRITE_PATH,
};
use coreflex_core::actuation::{LockKey, OutputField};
use coreflex_db::repositories::{ActuationLockRepo, DeviceStateRepo};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

const BINDINGS: &str = "/api/v1/control-bindings";
const WRITE: &str = "/api/v1/control/write";

fn bind_body(widget_id: &str, field: &str) -> Value {
    json!({
        "dashboard_id": "dash-1",
        "widget_id": widget_id,
        "widget_type": "toggle",
        "title": "Pump",
        "device_id": "D1",
        "field": field,
    })
}

fn write_body(widget_id: &str, value: bool) -> Value {
    json!({"dashboard_id": "dash-1", "widget_id": widget_id, "value": value})
}

fn lock_key() -> LockKey {
    LockKey::new("D1", OutputField::Do1)
}

/// A gateway that acknowledges every write by echoing it back.
fn acking_gateway() -> Router {
    Router::new().route(
        GATEWAY_WRITE_PATH,
        post(|Json(body): Json<Value>| async move {
            Json(json!({"ok": true, "output_index": body["output_index"], "value": body["value"]}))
        }),
    )
}

/// Tenant with a claimed `D1` and `w1` bound to `do1` on `dash-1`.
async fn bound_tenant(pool: &PgPool) -> String {
    let user = common::create_user(pool, "a@example.com").await;
    claimed_device(pool, user, "D1", json!({"do1": false})).await;
    let token = token_for(user);

    let app = common::build_test_app(pool.clone());
    let response =
        post_json(app, &format!("{BINDINGS}/bind"), &token, bind_body("w1", "do1")).await;
    assert_eq!(response.status(), StatusCode::OK);
    token
}

async fn assert_lock_released(pool: &PgPool) {
    let lock = ActuationLockRepo::find(pool, &lock_key()).await.unwrap();
    assert!(lock.is_none(), "actuation lock should be released");
}

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn bind_requires_claimed_device(pool: PgPool) {
    let user = common::create_user(&pool, "a@example.com").await;
    let app = common::build_test_app(pool);

    let response = post_json(
        app,
        &format!("{BINDINGS}/bind"),
        &token_for(user),
        bind_body("w1", "do1"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn bind_rejects_input_fields(pool: PgPool) {
    let user = common::create_user(&pool, "a@example.com").await;
    claimed_device(&pool, user, "D1", json!({})).await;
    let app = common::build_test_app(pool);

    let response = post_json(
        app,
        &format!("{BINDINGS}/bind"),
        &token_for(user),
        bind_body("w1", "di1"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn second_widget_on_same_output_conflicts(pool: PgPool) {
    let token = bound_tenant(&pool).await;
    let app = common::build_test_app(pool);

    let response =
        post_json(app, &format!("{BINDINGS}/bind"), &token, bind_body("w2", "do1")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "OUTPUT_IN_USE");
    assert_eq!(json["used_by_widget_id"], "w1");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn used_outputs_lists_bound_fields(pool: PgPool) {
    let token = bound_tenant(&pool).await;

    let app = common::build_test_app(pool.clone());
    post_json(app, &format!("{BINDINGS}/bind"), &token, bind_body("w2", "do3")).await;

    let app = common::build_test_app(pool);
    let response = get_auth(
        app,
        &format!("{BINDINGS}/used?dashboard_id=dash-1&device_id=D1"),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let used = json["data"].as_array().unwrap();
    assert_eq!(used.len(), 2);
    assert_eq!(used[0]["field"], "do1");
    assert_eq!(used[0]["widget_id"], "w1");
    assert_eq!(used[1]["field"], "do3");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn delete_binding_reports_count(pool: PgPool) {
    let token = bound_tenant(&pool).await;
    let uri = format!("{BINDINGS}?dashboard_id=dash-1&widget_id=w1");

    let app = common::build_test_app(pool.clone());
    let first = body_json(delete_auth(app, &uri, &token).await).await;
    assert_eq!(first["data"]["deleted"], 1);

    let app = common::build_test_app(pool);
    let second = body_json(delete_auth(app, &uri, &token).await).await;
    assert_eq!(second["data"]["deleted"], 0);
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn acknowledged_write_returns_ack(pool: PgPool) {
    let token = bound_tenant(&pool).await;
    let gateway = spawn_gateway(acking_gateway()).await;
    let app = common::build_test_app_with_gateway(pool.clone(), &gateway);

    let response = post_json(app, WRITE, &token, write_body("w1", true)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["ack"]["output_index"], 1);
    assert_eq!(json["ack"]["value"], true);

    assert_lock_released(&pool).await;
}

#[sqlx::test(migrations = "../db/migrations")]
async fn gateway_rejection_is_bad_gateway(pool: PgPool) {
    let token = bound_tenant(&pool).await;
    let gateway = spawn_gateway(Router::new().route(
        GATEWAY_WRITE_PATH,
        post(|| async { (StatusCode::UNPROCESSABLE_ENTITY, "relay fault") }),
    ))
    .await;
    let app = common::build_test_app_with_gateway(pool.clone(), &gateway);

    let response = post_json(app, WRITE, &token, write_body("w1", true)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "GATEWAY_FAILED");

    assert_lock_released(&pool).await;
}

#[sqlx::test(migrations = "../db/migrations")]
async fn slow_gateway_is_accepted_as_pending(pool: PgPool) {
    let token = bound_tenant(&pool).await;
    let gateway = spawn_gateway(Router::new().route(
        GATEWAY_WRITE_PATH,
        post(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({"ok": true}))
        }),
    ))
    .await;
    let app = common::build_test_app_with_gateway(pool.clone(), &gateway);

    let response = post_json(app, WRITE, &token, write_body("w1", false)).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["status"], "pending");

    assert_lock_released(&pool).await;
}

#[sqlx::test(migrations = "../db/migrations")]
async fn unreachable_gateway_is_pending(pool: PgPool) {
    let token = bound_tenant(&pool).await;
    let app = common::build_test_app(pool.clone());

    let response = post_json(app, WRITE, &token, write_body("w1", true)).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    assert_lock_released(&pool).await;
}

#[sqlx::test(migrations = "../db/migrations")]
async fn live_lock_blocks_write(pool: PgPool) {
    let token = bound_tenant(&pool).await;
    let holder: i64 = sqlx::query_scalar("SELECT id FROM users LIMIT 1")
        .fetch_one(&pool)
        .await
        .unwrap();
    let foreign_token = Uuid::new_v4();
    ActuationLockRepo::try_acquire(
        &pool,
        &lock_key(),
        holder,
        foreign_token,
        Duration::from_secs(10),
    )
    .await
    .unwrap()
    .expect("lock should be free");

    let gateway = spawn_gateway(acking_gateway()).await;
    let app = common::build_test_app_with_gateway(pool.clone(), &gateway);
    let response = post_json(app, WRITE, &token, write_body("w1", true)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "CONTROL_IN_PROGRESS");

    let lock = ActuationLockRepo::find(&pool, &lock_key()).await.unwrap().unwrap();
    assert_eq!(lock.lock_token, foreign_token, "a blocked write must not touch the lock");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn unbound_widget_is_not_found(pool: PgPool) {
    let token = bound_tenant(&pool).await;
    let app = common::build_test_app(pool);

    let response = post_json(app, WRITE, &token, write_body("w-missing", true)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn released_device_cannot_be_driven(pool: PgPool) {
    let token = bound_tenant(&pool).await;
    let user: i64 = sqlx::query_scalar("SELECT id FROM users LIMIT 1")
        .fetch_one(&pool)
        .await
        .unwrap();
    DeviceStateRepo::unclaim(&pool, user, "D1").await.unwrap();

    let gateway = spawn_gateway(acking_gateway()).await;
    let app = common::build_test_app_with_gateway(pool.clone(), &gateway);
    let response = post_json(app, WRITE, &token, write_body("w1", true)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    assert_lock_released(&pool).await;
}

#[sqlx::test(migrations = "../db/migrations")]
async fn other_tenant_cannot_use_binding(pool: PgPool) {
    bound_tenant(&pool).await;
    let intruder = common::create_user(&pool, "b@example.com").await;
    let app = common::build_test_app(pool);

    let response = post_json(app, WRITE, &token_for(intruder), write_body("w1", true)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
