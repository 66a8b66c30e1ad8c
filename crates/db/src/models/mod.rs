//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` entity struct matching the (joined) database row
//! - A create DTO for inserts and an update DTO (all `Option` fields)
//! - A filter struct consumed by the search queries

pub mod book;
pub mod genre;
pub mod status;
pub mod user;
