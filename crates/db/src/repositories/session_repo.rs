//! Repository for `user_sessions` (refresh tokens).

use crm_core::types::DbId;
use sqlx::PgPool;

use crate::models::session::{NewSession, RedeemedSession};

pub struct SessionRepo;

impl SessionRepo {
    pub async fn create(pool: &PgPool, input: &NewSession) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "INSERT INTO user_sessions (user_id, refresh_token_hash, expires_at) \
             VALUES ($1, $2, $3) \
             RETURNING id",
        )
        .bind(input.user_id)
        .bind(&input.refresh_token_hash)
        .bind(input.expires_at)
        .fetch_one(pool)
        .await
    }

    /// Consume a live refresh token: revoke its session and return it.
    ///
    /// A token redeems at most once. Concurrent callers with the same token
    /// serialize on the row, and all but the first see it revoked and get
    /// `None`.
    pub async fn redeem(
        pool: &PgPool,
        refresh_token_hash: &str,
    ) -> Result<Option<RedeemedSession>, sqlx::Error> {
        sqlx::query_as::<_, RedeemedSession>(
            "UPDATE user_sessions SET is_revoked = true \
             WHERE refresh_token_hash = $1 AND NOT is_revoked AND expires_at > NOW() \
             RETURNING id, user_id",
        )
        .bind(refresh_token_hash)
        .fetch_optional(pool)
        .await
    }

    /// Revoke every live session of a user. Returns how many were revoked.
    pub async fn revoke_all_for_user(pool: &PgPool, user_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_sessions SET is_revoked = true WHERE user_id = $1 AND NOT is_revoked",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
