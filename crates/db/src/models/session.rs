//! Refresh-token sessions. Only the SHA-256 of a refresh token is stored.

use crm_core::types::{DbId, Timestamp};
use sqlx::FromRow;

pub struct NewSession {
    pub user_id: DbId,
    pub refresh_token_hash: String,
    pub expires_at: Timestamp,
}

/// A session consumed by a refresh. It is revoked by the same statement
/// that returned it.
#[derive(Debug, Clone, FromRow)]
pub struct RedeemedSession {
    pub id: DbId,
    pub user_id: DbId,
}
