//! Domain primitives for the library backend.
//!
//! This crate has no internal dependencies and no I/O so it can be shared by
//! the persistence, audit, and API layers alike.

pub mod audit;
pub mod classify;
pub mod csv;
pub mod error;
pub mod lifecycle;
pub mod roles;
pub mod search;
pub mod types;
