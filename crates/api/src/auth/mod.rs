//! Authentication primitives.
//!
//! Tokens are issued by the identity service; this crate only verifies
//! them. See [`jwt`].

pub mod jwt;
