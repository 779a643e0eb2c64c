use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{user::User, StoreError};

/// Server-side bookkeeping of opaque refresh tokens.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn store_refresh_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Removes `token` and returns its owner, if it existed and had not
    /// expired. A token is consumed at most once, even by concurrent callers.
    async fn consume_refresh_token(&self, token: &str) -> Result<Option<User>, StoreError>;

    /// Removes `token`. Returns false when there was nothing to remove.
    async fn revoke_refresh_token(&self, token: &str) -> Result<bool, StoreError>;
}

// Database repository
pub struct AuthRepository {
    pool: PgPool,
}

impl AuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for AuthRepository {
    async fn store_refresh_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn consume_refresh_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        // A single DELETE takes the row lock, so only one caller gets the row back
        let user = sqlx::query_as::<_, User>(
            r#"
            WITH consumed AS (
                DELETE FROM refresh_tokens
                WHERE token = $1 AND expires_at > CURRENT_TIMESTAMP
                RETURNING user_id
            )
            SELECT u.id, u.username, u.email, u.password_hash, u.created_at, u.updated_at
            FROM users u
            INNER JOIN consumed c ON c.user_id = u.id
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn revoke_refresh_token(&self, token: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
