//! Repository for `users`, always joined with `roles` for the role name.

use crm_core::types::DbId;
use sqlx::PgPool;

use crate::models::user::{FailedLogin, NewUser, User};

const USER_COLUMNS: &str = "u.id, u.username, u.email, u.password_hash, r.name AS role, \
                            u.is_active, u.last_login_at, u.failed_login_count, u.locked_until, \
                            u.created_at";

pub struct UserRepo;

impl UserRepo {
    /// Insert an account holding the role named `input.role`.
    ///
    /// Returns `None` when no such role exists; nothing is inserted then.
    pub async fn create(pool: &PgPool, input: &NewUser) -> Result<Option<User>, sqlx::Error> {
        let query = format!(
            "WITH inserted AS ( \
                INSERT INTO users (username, email, password_hash, role_id) \
                SELECT $1, $2, $3, id FROM roles WHERE name = $4 \
                RETURNING * \
             ) \
             SELECT {USER_COLUMNS} FROM inserted u JOIN roles r ON r.id = u.role_id"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.username)
            .bind(&input.email)
            .bind(&input.password_hash)
            .bind(&input.role)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users u JOIN roles r ON r.id = u.role_id WHERE u.id = $1"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Exact, case-sensitive match.
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users u JOIN roles r ON r.id = u.role_id \
             WHERE u.username = $1"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// Newest accounts first.
    pub async fn list(pool: &PgPool) -> Result<Vec<User>, sqlx::Error> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users u JOIN roles r ON r.id = u.role_id \
             ORDER BY u.created_at DESC, u.id DESC"
        );
        sqlx::query_as::<_, User>(&query).fetch_all(pool).await
    }

    /// Returns `false` when the account is missing or already inactive.
    pub async fn deactivate(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET is_active = false WHERE id = $1 AND is_active")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count a rejected password and, once the count reaches
    /// `max_attempts`, lock the account for `lock_minutes`.
    ///
    /// Increment and lock happen in one statement, so concurrent failures
    /// cannot skip the threshold. Returns `None` if the account is gone.
    pub async fn record_failed_login(
        pool: &PgPool,
        id: DbId,
        max_attempts: i32,
        lock_minutes: i32,
    ) -> Result<Option<FailedLogin>, sqlx::Error> {
        sqlx::query_as::<_, FailedLogin>(
            "UPDATE users SET \
                failed_login_count = failed_login_count + 1, \
                locked_until = CASE \
                    WHEN failed_login_count + 1 >= $2 THEN NOW() + make_interval(mins => $3) \
                    ELSE locked_until \
                END \
             WHERE id = $1 \
             RETURNING failed_login_count, locked_until",
        )
        .bind(id)
        .bind(max_attempts)
        .bind(lock_minutes)
        .fetch_optional(pool)
        .await
    }

    /// Clear the failure counter and lock, and stamp `last_login_at`.
    pub async fn record_successful_login(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET failed_login_count = 0, locked_until = NULL, last_login_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
