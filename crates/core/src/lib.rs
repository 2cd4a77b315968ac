//! Domain logic for the CoreFlex device backend.
//!
//! Everything in this crate is free of I/O: the database, gateway and HTTP
//! layers call into it with values they have already loaded.

pub mod actuation;
pub mod counter;
pub mod counter_tick;
pub mod error;
pub mod telemetry;
pub mod types;
