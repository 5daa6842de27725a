//! Notification repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, NewNotification, Notification, NotificationKind, PagedResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Executor, MySql, Row, Sqlite};
use std::sync::Arc;

const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, message, article_id, is_read, created_at";

/// Notification repository trait
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Store a notification
    async fn create(&self, input: &NewNotification) -> Result<Notification>;

    /// Notifications for a user, newest first
    async fn list_for_user(
        &self,
        user_id: i64,
        unread_only: bool,
        params: &ListParams,
    ) -> Result<PagedResult<Notification>>;

    /// Number of unread notifications for a user
    async fn unread_count(&self, user_id: i64) -> Result<i64>;

    /// Mark one notification read. Returns false when it does not belong to the user.
    async fn mark_read(&self, user_id: i64, id: i64) -> Result<bool>;

    /// Mark everything read for a user
    async fn mark_all_read(&self, user_id: i64) -> Result<u64>;
}

/// SQLx-based notification repository implementation
pub struct SqlxNotificationRepository {
    pool: DynDatabasePool,
}

impl SqlxNotificationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NotificationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl NotificationRepository for SqlxNotificationRepository {
    async fn create(&self, input: &NewNotification) -> Result<Notification> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => insert_notification_sqlite(self.pool.sqlite()?, input).await,
            DatabaseDriver::Mysql => insert_notification_mysql(self.pool.mysql()?, input).await,
        }
    }

    async fn list_for_user(
        &self,
        user_id: i64,
        unread_only: bool,
        params: &ListParams,
    ) -> Result<PagedResult<Notification>> {
        let filter = if unread_only {
            "WHERE user_id = ? AND is_read = ?"
        } else {
            "WHERE user_id = ?"
        };
        let select_sql = format!(
            "SELECT {} FROM notifications {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            NOTIFICATION_COLUMNS, filter
        );
        let count_sql = format!("SELECT COUNT(*) FROM notifications {}", filter);

        let (items, total) = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                let mut select = sqlx::query(&select_sql).bind(user_id);
                let mut count = sqlx::query_scalar::<_, i64>(&count_sql).bind(user_id);
                if unread_only {
                    select = select.bind(false);
                    count = count.bind(false);
                }
                let rows = select
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list notifications")?;
                let total = count
                    .fetch_one(pool)
                    .await
                    .context("Failed to count notifications")?;
                let items = rows
                    .iter()
                    .map(row_to_notification_sqlite)
                    .collect::<Result<Vec<_>>>()?;
                (items, total)
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                let mut select = sqlx::query(&select_sql).bind(user_id);
                let mut count = sqlx::query_scalar::<_, i64>(&count_sql).bind(user_id);
                if unread_only {
                    select = select.bind(false);
                    count = count.bind(false);
                }
                let rows = select
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list notifications")?;
                let total = count
                    .fetch_one(pool)
                    .await
                    .context("Failed to count notifications")?;
                let items = rows
                    .iter()
                    .map(row_to_notification_mysql)
                    .collect::<Result<Vec<_>>>()?;
                (items, total)
            }
        };

        Ok(PagedResult::new(items, total, params))
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = ?";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar::<_, i64>(sql)
                .bind(user_id)
                .bind(false)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count unread notifications")?,
            DatabaseDriver::Mysql => sqlx::query_scalar::<_, i64>(sql)
                .bind(user_id)
                .bind(false)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count unread notifications")?,
        };
        Ok(count)
    }

    async fn mark_read(&self, user_id: i64, id: i64) -> Result<bool> {
        // Matching rows that are already read still count as found.
        let exists_sql = "SELECT COUNT(*) FROM notifications WHERE id = ? AND user_id = ?";
        let update_sql = "UPDATE notifications SET is_read = ? WHERE id = ? AND user_id = ?";
        let found = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                let found: i64 = sqlx::query_scalar(exists_sql)
                    .bind(id)
                    .bind(user_id)
                    .fetch_one(pool)
                    .await
                    .context("Failed to look up notification")?;
                if found > 0 {
                    sqlx::query(update_sql)
                        .bind(true)
                        .bind(id)
                        .bind(user_id)
                        .execute(pool)
                        .await
                        .context("Failed to mark notification read")?;
                }
                found > 0
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                let found: i64 = sqlx::query_scalar(exists_sql)
                    .bind(id)
                    .bind(user_id)
                    .fetch_one(pool)
                    .await
                    .context("Failed to look up notification")?;
                if found > 0 {
                    sqlx::query(update_sql)
                        .bind(true)
                        .bind(id)
                        .bind(user_id)
                        .execute(pool)
                        .await
                        .context("Failed to mark notification read")?;
                }
                found > 0
            }
        };
        Ok(found)
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<u64> {
        let sql = "UPDATE notifications SET is_read = ? WHERE user_id = ? AND is_read = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(true)
                .bind(user_id)
                .bind(false)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to mark notifications read")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(true)
                .bind(user_id)
                .bind(false)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to mark notifications read")?
                .rows_affected(),
        };
        Ok(affected)
    }
}

fn parse_kind(kind: &str) -> Result<NotificationKind> {
    NotificationKind::from_str(kind)
        .ok_or_else(|| anyhow::anyhow!("Invalid notification kind in database: {}", kind))
}

// ============================================================================
// SQLite implementations
// ============================================================================

/// Insert on a pool or inside another repository's transaction
pub(crate) async fn insert_notification_sqlite<'e, E>(
    executor: E,
    input: &NewNotification,
) -> Result<Notification>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO notifications (user_id, kind, message, article_id, is_read, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(input.user_id)
    .bind(input.kind.as_str())
    .bind(&input.message)
    .bind(input.article_id)
    .bind(false)
    .bind(now)
    .execute(executor)
    .await
    .context("Failed to create notification")?;

    Ok(Notification {
        id: result.last_insert_rowid(),
        user_id: input.user_id,
        kind: input.kind,
        message: input.message.clone(),
        article_id: input.article_id,
        is_read: false,
        created_at: now,
    })
}

fn row_to_notification_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Notification> {
    let kind: String = row.get("kind");
    Ok(Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        kind: parse_kind(&kind)?,
        message: row.get("message"),
        article_id: row.get("article_id"),
        is_read: row.get("is_read"),
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

pub(crate) async fn insert_notification_mysql<'e, E>(
    executor: E,
    input: &NewNotification,
) -> Result<Notification>
where
    E: Executor<'e, Database = MySql>,
{
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO notifications (user_id, kind, message, article_id, is_read, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(input.user_id)
    .bind(input.kind.as_str())
    .bind(&input.message)
    .bind(input.article_id)
    .bind(false)
    .bind(now)
    .execute(executor)
    .await
    .context("Failed to create notification")?;

    Ok(Notification {
        id: result.last_insert_id() as i64,
        user_id: input.user_id,
        kind: input.kind,
        message: input.message.clone(),
        article_id: input.article_id,
        is_read: false,
        created_at: now,
    })
}

fn row_to_notification_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Notification> {
    let kind: String = row.get("kind");
    Ok(Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        kind: parse_kind(&kind)?,
        message: row.get("message"),
        article_id: row.get("article_id"),
        is_read: row.get("is_read"),
        created_at: row.get("created_at"),
    })
}
