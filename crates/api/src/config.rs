use std::time::Duration;

use coreflex_core::actuation::DEFAULT_LOCK_TTL;
use coreflex_gateway::GatewayConfig;

use crate::auth::jwt::JwtConfig;

/// Default counter tick interval in seconds.
const DEFAULT_COUNTER_TICK_SECS: f64 = 2.0;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Maximum wait for background tasks after the server stops (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// JWT verification settings.
    pub jwt: JwtConfig,
    /// Nominal interval between counter tick passes.
    pub counter_tick_interval: Duration,
    /// Absolute lifetime of an actuation lock.
    pub actuation_lock_ttl: Duration,
    /// When set, telemetry ingestion requires a matching `X-Ingest-Key`.
    pub ingest_api_key: Option<String>,
    /// External automation gateway.
    pub gateway: GatewayConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                 |
    /// |---------------------------|-------------------------|
    /// | `HOST`                    | `0.0.0.0`               |
    /// | `PORT`                    | `3000`                  |
    /// | `CORS_ORIGINS`            | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`   | `30`                    |
    /// | `COUNTER_TICK_SECS`       | `2.0`                   |
    /// | `ACTUATION_LOCK_TTL_SECS` | `10`                    |
    /// | `INGEST_API_KEY`          | unset                   |
    ///
    /// JWT and gateway variables are documented on [`JwtConfig::from_env`]
    /// and [`GatewayConfig::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let tick_secs: f64 = std::env::var("COUNTER_TICK_SECS")
            .map(|v| v.parse().expect("COUNTER_TICK_SECS must be a number"))
            .unwrap_or(DEFAULT_COUNTER_TICK_SECS);
        assert!(
            tick_secs.is_finite() && tick_secs > 0.0,
            "COUNTER_TICK_SECS must be positive"
        );

        let actuation_lock_ttl = std::env::var("ACTUATION_LOCK_TTL_SECS")
            .map(|v| {
                Duration::from_secs(
                    v.parse()
                        .expect("ACTUATION_LOCK_TTL_SECS must be a valid u64"),
                )
            })
            .unwrap_or(DEFAULT_LOCK_TTL);

        let ingest_api_key = std::env::var("INGEST_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt: JwtConfig::from_env(),
            counter_tick_interval: Duration::from_secs_f64(tick_secs),
            actuation_lock_ttl,
            ingest_api_key,
            gateway: GatewayConfig::from_env(),
        }
    }
}
