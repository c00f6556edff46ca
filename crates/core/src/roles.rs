//! Well-known role name constants.
//!
//! These must match the seed data in `20250301000001_create_roles_and_users.sql`.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MANAGER: &str = "manager";
pub const ROLE_USER: &str = "user";

/// Rank a role name for "at least" comparisons. Unknown roles rank lowest.
pub fn role_rank(role: &str) -> u8 {
    match role {
        ROLE_ADMIN => 3,
        ROLE_MANAGER => 2,
        ROLE_USER => 1,
        _ => 0,
    }
}

/// Whether `role` meets or exceeds `minimum`.
pub fn has_at_least(role: &str, minimum: &str) -> bool {
    role_rank(role) >= role_rank(minimum) && role_rank(role) > 0
}
