pub mod actuation_lock;
pub mod control_binding;
pub mod counter;
pub mod device;
pub mod user;
