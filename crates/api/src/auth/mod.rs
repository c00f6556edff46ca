//! Credential primitives: Argon2id password hashes, JWT access tokens and
//! opaque refresh tokens.

pub mod jwt;
pub mod password;
