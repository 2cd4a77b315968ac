//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async data-access
//! methods. Plain CRUD takes `&PgPool`; methods that must run inside a
//! caller-owned transaction or on a caller-owned connection accept any
//! [`sqlx::PgExecutor`].

pub mod actuation_lock_repo;
pub mod control_binding_repo;
pub mod counter_repo;
pub mod device_state_repo;
pub mod user_repo;

pub use actuation_lock_repo::ActuationLockRepo;
pub use control_binding_repo::{BindOutcome, ControlBindingInput, ControlBindingRepo};
pub use counter_repo::{CounterBindingInput, CounterRepo};
pub use device_state_repo::DeviceStateRepo;
pub use user_repo::UserRepo;
