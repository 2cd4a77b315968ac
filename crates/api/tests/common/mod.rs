#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use uuid::Uuid;

use coreflex_api::auth::jwt::{Claims, JwtConfig};
use coreflex_api::config::ServerConfig;
use coreflex_api::engine::actuation::ActuationManager;
use coreflex_api::engine::counter_tick::TickHeartbeat;
use coreflex_api::routes;
use coreflex_api::state::AppState;
use coreflex_core::telemetry::{DeviceModel, LiveTelemetryCache};
use coreflex_db::models::user::CreateUser;
use coreflex_db::repositories::{DeviceStateRepo, UserRepo};
use coreflex_gateway::{GatewayClient, GatewayConfig};

pub const TEST_JWT_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";

/// Gateway path used by the throwaway gateways in these tests.
pub const GATEWAY_WRITE_PATH: &str = "/api/outputs/write";

/// Nothing listens here; writes against it come back pending.
const UNREACHABLE_GATEWAY: &str = "http://127.0.0.1:9";

/// Build a test `ServerConfig` pointing at `gateway_url`.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default),
/// a 30-second request timeout and short gateway timeouts.
pub fn test_config(gateway_url: &str) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
        },
        counter_tick_interval: Duration::from_secs(2),
        actuation_lock_ttl: Duration::from_secs(10),
        ingest_api_key: None,
        gateway: GatewayConfig {
            base_url: gateway_url.to_string(),
            write_path: GATEWAY_WRITE_PATH.to_string(),
            shared_secret: None,
            connect_timeout: Duration::from_millis(300),
            total_timeout: Duration::from_millis(600),
        },
    }
}

/// Build the full application router with all middleware layers, using the
/// given database pool and an unreachable gateway.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(pool, test_config(UNREACHABLE_GATEWAY))
}

/// Build the application router against a running test gateway.
pub fn build_test_app_with_gateway(pool: PgPool, gateway_url: &str) -> Router {
    build_test_app_with(pool, test_config(gateway_url))
}

/// Build the application router sharing `heartbeat` with the health route.
pub fn build_test_app_with_heartbeat(pool: PgPool, heartbeat: Arc<TickHeartbeat>) -> Router {
    build_app(pool, test_config(UNREACHABLE_GATEWAY), heartbeat)
}

pub fn build_test_app_with(pool: PgPool, config: ServerConfig) -> Router {
    build_app(pool, config, Arc::new(TickHeartbeat::default()))
}

/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack that production uses.
fn build_app(pool: PgPool, config: ServerConfig, tick_heartbeat: Arc<TickHeartbeat>) -> Router {
    let gateway = GatewayClient::new(&config.gateway).expect("gateway client should build");
    let actuation = Arc::new(ActuationManager::new(
        pool.clone(),
        gateway,
        config.actuation_lock_ttl,
    ));

    let state = AppState {
        pool,
        config: Arc::new(config),
        actuation,
        live_cache: Arc::new(LiveTelemetryCache::new()),
        tick_heartbeat,
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Sign an access token for `user_id` with the test secret.
pub fn token_for(user_id: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        exp: now + 900,
        iat: now,
        jti: Uuid::new_v4().to_string(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("token encoding should succeed")
}

/// Create a tenant and return its id.
pub async fn create_user(pool: &PgPool, email: &str) -> i64 {
    UserRepo::create(
        pool,
        &CreateUser {
            email: email.to_string(),
            name: "Tenant".to_string(),
        },
    )
    .await
    .expect("user creation should succeed")
    .id
}

/// Register `device_id` with the given values and claim it for `user_id`.
pub async fn claimed_device(pool: &PgPool, user_id: i64, device_id: &str, io: Value) {
    set_values(pool, device_id, io).await;
    DeviceStateRepo::claim(pool, user_id, device_id)
        .await
        .expect("claim should succeed");
}

/// Merge telemetry into a device's stored values.
pub async fn set_values(pool: &PgPool, device_id: &str, io: Value) {
    let Value::Object(values) = io else {
        panic!("device values must be a JSON object");
    };
    DeviceStateRepo::record_telemetry(pool, device_id, DeviceModel::Zhc1921, &values)
        .await
        .expect("telemetry write should succeed");
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_gateway(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: Router, uri: &str, token: &str, body: Value) -> Response {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, Method::DELETE, uri, Some(token), None).await
}

pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}
