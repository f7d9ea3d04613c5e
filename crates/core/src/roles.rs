//! Well-known role name constants.
//!
//! These must match the `CHECK` constraint on `users.role` in
//! `20260301000001_create_users.sql`.

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

/// Returns `true` if `role` is one of the known role names.
pub fn is_known_role(role: &str) -> bool {
    role == ROLE_USER || role == ROLE_ADMIN
}
