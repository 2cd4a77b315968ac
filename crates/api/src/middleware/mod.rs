//! Request extractors.
//!
//! - [`auth::AuthUser`] -- the tenant behind a JWT Bearer token.
//! - [`ingest::IngestKey`] -- shared-key check for device telemetry pushes.

pub mod auth;
pub mod ingest;
