//! Output write requests against the gateway.

use coreflex_core::types::DbId;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::GatewayError;

/// Header carrying the optional shared secret.
pub const SECRET_HEADER: &str = "X-Gateway-Secret";

/// One output write, as sent on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct WriteCommand {
    pub device_id: String,
    /// 1-based relay index (1..=4).
    pub output_index: u8,
    pub value: bool,
    pub correlation_id: Uuid,
    pub tenant_id: DbId,
}

/// How the gateway answered a write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// 2xx. Carries the acknowledgement body (`null` if empty, a string if
    /// not JSON).
    Acknowledged(Value),
    /// Non-2xx. The write did not happen.
    Rejected { status: u16, body: String },
    /// Timed out, unreachable or dropped mid-answer. The write may still
    /// land.
    Pending,
}

/// HTTP client for the automation gateway.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    write_url: String,
    shared_secret: Option<String>,
}

impl GatewayClient {
    /// Build a client with split connect/total timeouts from `config`.
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout)
            .build()
            .map_err(GatewayError::Client)?;

        Ok(Self {
            client,
            write_url: config.write_url(),
            shared_secret: config.shared_secret.clone(),
        })
    }

    /// Send a write command and classify the answer.
    ///
    /// Only an explicit non-2xx answer counts as a rejection. Any transport
    /// failure once the request is on its way is `Pending`: the gateway may
    /// already have acted on it.
    pub async fn write_output(&self, command: &WriteCommand) -> WriteOutcome {
        let mut request = self.client.post(&self.write_url).json(command);
        if let Some(secret) = &self.shared_secret {
            request = request.header(SECRET_HEADER, secret);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => return pending(command, &err),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) if status.is_success() => return pending(command, &err),
            Err(_) => String::new(),
        };

        if !status.is_success() {
            return WriteOutcome::Rejected {
                status: status.as_u16(),
                body,
            };
        }

        WriteOutcome::Acknowledged(parse_ack(&body))
    }
}

fn pending(command: &WriteCommand, err: &reqwest::Error) -> WriteOutcome {
    tracing::warn!(
        correlation_id = %command.correlation_id,
        device_id = %command.device_id,
        timeout = err.is_timeout(),
        error = %err,
        "Gateway did not answer, write pending",
    );
    WriteOutcome::Pending
}

fn parse_ack(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ack_parsing() {
        assert_eq!(parse_ack(""), Value::Null);
        assert_eq!(parse_ack(r#"{"ok":true}"#), json!({"ok": true}));
        assert_eq!(parse_ack("done"), json!("done"));
    }

    #[test]
    fn command_wire_shape() {
        let command = WriteCommand {
            device_id: "D1".into(),
            output_index: 2,
            value: true,
            correlation_id: Uuid::nil(),
            tenant_id: 7,
        };
        let wire = serde_json::to_value(&command).unwrap();
        assert_eq!(wire["output_index"], 2);
        assert_eq!(wire["tenant_id"], 7);
        assert_eq!(wire["value"], true);
    }
}
