//! HTTP client for the external automation gateway that performs physical
//! output writes.
//!
//! The gateway is outside this system's control, so every call carries a
//! hard timeout and the result is classified three ways: acknowledged,
//! rejected, or pending (timed out / unreachable, may still have landed).

pub mod client;
pub mod config;
pub mod error;

pub use client::{GatewayClient, WriteCommand, WriteOutcome};
pub use config::GatewayConfig;
pub use error::GatewayError;
