/// Errors from the gateway client layer.
///
/// Transport failures during a write are not errors here; they surface as
/// [`crate::WriteOutcome::Pending`].
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The underlying HTTP client could not be constructed.
    #[error("Failed to build gateway HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}
