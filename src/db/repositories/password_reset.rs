//! Password reset token repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::PasswordResetToken;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Password reset token repository trait
#[async_trait]
pub trait PasswordResetRepository: Send + Sync {
    /// Store a new token digest
    async fn create(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordResetToken>;

    /// Look a token up by its digest
    async fn get_by_hash(&self, token_hash: &str) -> Result<Option<PasswordResetToken>>;

    /// Delete one token
    async fn delete(&self, id: i64) -> Result<()>;

    /// Delete every token belonging to a user
    async fn delete_by_user(&self, user_id: i64) -> Result<u64>;

    /// Delete expired tokens, returning how many were removed
    async fn delete_expired(&self) -> Result<u64>;
}

/// SQLx-based password reset token repository
pub struct SqlxPasswordResetRepository {
    pool: DynDatabasePool,
}

impl SqlxPasswordResetRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PasswordResetRepository> {
        Arc::new(Self::new(pool))
    }

    async fn execute_with_i64(&self, sql: &str, value: i64, what: &'static str) -> Result<u64> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(value)
                .execute(self.pool.sqlite()?)
                .await
                .context(what)?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(value)
                .execute(self.pool.mysql()?)
                .await
                .context(what)?
                .rows_affected(),
        };
        Ok(affected)
    }
}

#[async_trait]
impl PasswordResetRepository for SqlxPasswordResetRepository {
    async fn create(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordResetToken> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_token_sqlite(self.pool.sqlite()?, user_id, token_hash, expires_at).await
            }
            DatabaseDriver::Mysql => {
                create_token_mysql(self.pool.mysql()?, user_id, token_hash, expires_at).await
            }
        }
    }

    async fn get_by_hash(&self, token_hash: &str) -> Result<Option<PasswordResetToken>> {
        let sql = "SELECT id, user_id, token_hash, expires_at, created_at \
                   FROM password_reset_tokens WHERE token_hash = ?";
        let token = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(token_hash)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get reset token")?
                .map(|row| PasswordResetToken {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    token_hash: row.get("token_hash"),
                    expires_at: row.get("expires_at"),
                    created_at: row.get("created_at"),
                }),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(token_hash)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get reset token")?
                .map(|row| PasswordResetToken {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    token_hash: row.get("token_hash"),
                    expires_at: row.get("expires_at"),
                    created_at: row.get("created_at"),
                }),
        };
        Ok(token)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.execute_with_i64(
            "DELETE FROM password_reset_tokens WHERE id = ?",
            id,
            "Failed to delete reset token",
        )
        .await?;
        Ok(())
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<u64> {
        self.execute_with_i64(
            "DELETE FROM password_reset_tokens WHERE user_id = ?",
            user_id,
            "Failed to delete user reset tokens",
        )
        .await
    }

    async fn delete_expired(&self) -> Result<u64> {
        let sql = "DELETE FROM password_reset_tokens WHERE expires_at < ?";
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete expired reset tokens")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete expired reset tokens")?
                .rows_affected(),
        };
        Ok(affected)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_token_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<PasswordResetToken> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO password_reset_tokens (user_id, token_hash, expires_at, created_at) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create reset token")?;

    Ok(PasswordResetToken {
        id: result.last_insert_rowid(),
        user_id,
        token_hash: token_hash.to_string(),
        expires_at,
        created_at: now,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_token_mysql(
    pool: &MySqlPool,
    user_id: i64,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<PasswordResetToken> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO password_reset_tokens (user_id, token_hash, expires_at, created_at) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create reset token")?;

    Ok(PasswordResetToken {
        id: result.last_insert_id() as i64,
        user_id,
        token_hash: token_hash.to_string(),
        expires_at,
        created_at: now,
    })
}
