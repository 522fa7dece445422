//! Refresh token records: one current refresh token per principal.
//!
//! Issuing a new refresh token overwrites the stored JTI, which is the only
//! revocation mechanism. Access tokens are never stored.

use sqlx::sqlite::SqlitePool;

/// The current refresh token of a principal.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshRecord {
    pub principal_id: i64,
    pub current_jti: String,
    /// Unix seconds
    pub expires_at: i64,
    pub updated_at: String,
}

/// Store for the per-principal refresh token records.
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Unconditionally set the principal's current refresh token.
    pub async fn replace(
        &self,
        principal_id: i64,
        jti: &str,
        expires_at: u64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO refresh_tokens (principal_id, current_jti, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(principal_id) DO UPDATE SET
                current_jti = excluded.current_jti,
                expires_at = excluded.expires_at,
                updated_at = datetime('now')",
        )
        .bind(principal_id)
        .bind(jti)
        .bind(expires_at as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replace the current refresh token only if it still equals `expected_jti`.
    ///
    /// The comparison and the write are one statement, so of several callers
    /// presenting the same `expected_jti` at most one gets `true`.
    pub async fn compare_and_replace(
        &self,
        principal_id: i64,
        expected_jti: &str,
        new_jti: &str,
        expires_at: u64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens
             SET current_jti = ?, expires_at = ?, updated_at = datetime('now')
             WHERE principal_id = ? AND current_jti = ?",
        )
        .bind(new_jti)
        .bind(expires_at as i64)
        .bind(principal_id)
        .bind(expected_jti)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Get the principal's record, if any.
    pub async fn get(&self, principal_id: i64) -> Result<Option<RefreshRecord>, sqlx::Error> {
        sqlx::query_as(
            "SELECT principal_id, current_jti, expires_at, updated_at FROM refresh_tokens WHERE principal_id = ?",
        )
        .bind(principal_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Remove the principal's record (logout). Returns whether one existed.
    pub async fn clear(&self, principal_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE principal_id = ?")
            .bind(principal_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete all records past their expiry.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM refresh_tokens WHERE expires_at < CAST(strftime('%s', 'now') AS INTEGER)",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
