//! Request extractors for authentication and role checks.
//!
//! - [`auth::AuthUser`] -- the caller identified by a Bearer access token.
//! - [`rbac::RequireAdmin`], [`rbac::RequireManager`], [`rbac::RequireAuth`].

pub mod auth;
pub mod rbac;
