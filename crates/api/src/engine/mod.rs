//! Background and request-driven engines.
//!
//! - [`counter_tick`] -- the periodic pass that advances device counters.
//! - [`actuation`] -- lock-guarded output writes through the gateway.

pub mod actuation;
pub mod counter_tick;
