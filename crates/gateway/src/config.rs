use std::time::Duration;

/// Gateway connection settings.
///
/// | Env var                      | Default                  |
/// |------------------------------|--------------------------|
/// | `GATEWAY_URL`                | `http://127.0.0.1:1880`  |
/// | `GATEWAY_WRITE_PATH`         | `/api/outputs/write`     |
/// | `GATEWAY_SHARED_SECRET`      | unset                    |
/// | `GATEWAY_CONNECT_TIMEOUT_MS` | `1500`                   |
/// | `GATEWAY_TOTAL_TIMEOUT_MS`   | `3500`                   |
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL without a trailing slash.
    pub base_url: String,
    pub write_path: String,
    /// Sent as `X-Gateway-Secret` when set.
    pub shared_secret: Option<String>,
    pub connect_timeout: Duration,
    /// Budget for the whole request, connect included.
    pub total_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:1880".to_string(),
            write_path: "/api/outputs/write".to_string(),
            shared_secret: None,
            connect_timeout: Duration::from_millis(1500),
            total_timeout: Duration::from_millis(3500),
        }
    }
}

impl GatewayConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// # Panics
    ///
    /// Panics if a timeout variable is set but is not a valid integer.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = std::env::var("GATEWAY_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);

        let write_path = std::env::var("GATEWAY_WRITE_PATH").unwrap_or(defaults.write_path);

        let shared_secret = std::env::var("GATEWAY_SHARED_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let connect_timeout = std::env::var("GATEWAY_CONNECT_TIMEOUT_MS")
            .map(|v| {
                Duration::from_millis(
                    v.parse()
                        .expect("GATEWAY_CONNECT_TIMEOUT_MS must be a valid u64"),
                )
            })
            .unwrap_or(defaults.connect_timeout);

        let total_timeout = std::env::var("GATEWAY_TOTAL_TIMEOUT_MS")
            .map(|v| {
                Duration::from_millis(
                    v.parse()
                        .expect("GATEWAY_TOTAL_TIMEOUT_MS must be a valid u64"),
                )
            })
            .unwrap_or(defaults.total_timeout);

        Self {
            base_url,
            write_path,
            shared_secret,
            connect_timeout,
            total_timeout,
        }
    }

    /// Full URL of the write endpoint.
    pub fn write_url(&self) -> String {
        let path = self.write_path.trim_start_matches('/');
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_url_joins_without_double_slash() {
        let config = GatewayConfig {
            base_url: "http://gw:1880/".into(),
            write_path: "/api/outputs/write".into(),
            ..GatewayConfig::default()
        };
        assert_eq!(config.write_url(), "http://gw:1880/api/outputs/write");
    }
}
