//! Well-known role name constants.
//!
//! These must match the `role` check constraint on the `users` table.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

/// Whether `role` is one of the known role names.
pub fn is_known_role(role: &str) -> bool {
    matches!(role, ROLE_ADMIN | ROLE_USER)
}
