pub mod control;
pub mod control_bindings;
pub mod counters;
pub mod devices;
pub mod telemetry;
