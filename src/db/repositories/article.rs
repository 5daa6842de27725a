//! Article repository
//!
//! Database operations for articles.
//!
//! This module provides:
//! - `ArticleRepository` trait defining the interface for article data access
//! - `SqlxArticleRepository` implementing the trait for SQLite and MySQL
//! - `ArticleQuery` for filtered, ordered listings

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::db::repositories::notification::{insert_notification_mysql, insert_notification_sqlite};
use crate::models::{
    Article, ArticleStatus, CreateArticleInput, ListParams, NewNotification, PagedResult,
    StatusCounts,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const ARTICLE_COLUMNS: &str = "id, title, content, image, status, is_approved, author_id, \
     rejection_reason, reviewed_by, reviewed_at, created_at, updated_at";

// Guarded on the status the caller read, so racing transitions cannot both apply.
const UPDATE_ARTICLE_SQL: &str = r#"
    UPDATE articles
    SET title = ?, content = ?, image = ?, status = ?, is_approved = ?,
        rejection_reason = ?, reviewed_by = ?, reviewed_at = ?, updated_at = ?
    WHERE id = ? AND status = ?
"#;

/// Filter and ordering for article listings
#[derive(Debug, Clone, Copy, Default)]
pub struct ArticleQuery {
    pub status: Option<ArticleStatus>,
    pub author_id: Option<i64>,
    /// Oldest first instead of newest first
    pub oldest_first: bool,
}

impl ArticleQuery {
    pub fn with_status(status: ArticleStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn by_author(author_id: i64, status: Option<ArticleStatus>) -> Self {
        Self {
            status,
            author_id: Some(author_id),
            oldest_first: false,
        }
    }

    fn where_clause(&self) -> String {
        let mut conditions = Vec::new();
        if self.status.is_some() {
            conditions.push("status = ?");
        }
        if self.author_id.is_some() {
            conditions.push("author_id = ?");
        }
        if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        }
    }

    fn order_clause(&self) -> &'static str {
        if self.oldest_first {
            " ORDER BY created_at ASC, id ASC"
        } else {
            " ORDER BY created_at DESC, id DESC"
        }
    }
}

/// Article repository trait
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Create a new article for `author_id` in the given status
    async fn create(
        &self,
        author_id: i64,
        input: &CreateArticleInput,
        status: ArticleStatus,
    ) -> Result<Article>;

    /// Get article by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Article>>;

    /// Persist every mutable column of `article` if its stored status is
    /// still `expected`. `notification` is written in the same transaction.
    ///
    /// Returns `None` and writes nothing when no row matched: the article
    /// was deleted or its status changed in the meantime.
    async fn update(
        &self,
        article: &Article,
        expected: ArticleStatus,
        notification: Option<&NewNotification>,
    ) -> Result<Option<Article>>;

    /// Delete an article
    async fn delete(&self, id: i64) -> Result<()>;

    /// List articles matching `query`
    async fn list(&self, query: &ArticleQuery, params: &ListParams) -> Result<PagedResult<Article>>;

    /// Count articles per status
    async fn count_by_status(&self) -> Result<StatusCounts>;
}

/// SQLx-based article repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
    /// Create a new SQLx article repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn create(
        &self,
        author_id: i64,
        input: &CreateArticleInput,
        status: ArticleStatus,
    ) -> Result<Article> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_article_sqlite(self.pool.sqlite()?, author_id, input, status).await?
            }
            DatabaseDriver::Mysql => {
                create_article_mysql(self.pool.mysql()?, author_id, input, status).await?
            }
        };

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Article not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>> {
        let sql = format!("SELECT {} FROM articles WHERE id = ?", ARTICLE_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get article by ID")?;
                row.as_ref().map(row_to_article_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get article by ID")?;
                row.as_ref().map(row_to_article_mysql).transpose()
            }
        }
    }

    async fn update(
        &self,
        article: &Article,
        expected: ArticleStatus,
        notification: Option<&NewNotification>,
    ) -> Result<Option<Article>> {
        let applied = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_article_sqlite(self.pool.sqlite()?, article, expected, notification).await?
            }
            DatabaseDriver::Mysql => {
                update_article_mysql(self.pool.mysql()?, article, expected, notification).await?
            }
        };

        if !applied {
            return Ok(None);
        }
        self.get_by_id(article.id).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let sql = "DELETE FROM articles WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete article")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to delete article")?;
            }
        }
        Ok(())
    }

    async fn list(&self, query: &ArticleQuery, params: &ListParams) -> Result<PagedResult<Article>> {
        let (items, total) = match self.pool.driver() {
            DatabaseDriver::Sqlite => list_articles_sqlite(self.pool.sqlite()?, query, params).await?,
            DatabaseDriver::Mysql => list_articles_mysql(self.pool.mysql()?, query, params).await?,
        };
        Ok(PagedResult::new(items, total, params))
    }

    async fn count_by_status(&self) -> Result<StatusCounts> {
        let sql = "SELECT status, COUNT(*) AS count FROM articles GROUP BY status";
        let pairs: Vec<(String, i64)> = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to count articles by status")?
                .iter()
                .map(|row| (row.get::<String, _>("status"), row.get::<i64, _>("count")))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to count articles by status")?
                .iter()
                .map(|row| (row.get::<String, _>("status"), row.get::<i64, _>("count")))
                .collect(),
        };

        let mut counts = StatusCounts::default();
        for (status, count) in pairs {
            match ArticleStatus::from_str(&status) {
                Some(status) => counts.add(status, count),
                None => tracing::warn!("Ignoring articles with unknown status: {}", status),
            }
        }
        Ok(counts)
    }
}

fn parse_status(status: &str) -> Result<ArticleStatus> {
    ArticleStatus::from_str(status)
        .ok_or_else(|| anyhow::anyhow!("Invalid article status in database: {}", status))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_article_sqlite(
    pool: &SqlitePool,
    author_id: i64,
    input: &CreateArticleInput,
    status: ArticleStatus,
) -> Result<i64> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO articles (title, content, image, status, is_approved, author_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(&input.content)
    .bind(&input.image)
    .bind(status.as_str())
    .bind(status == ArticleStatus::Approved)
    .bind(author_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create article")?;

    Ok(result.last_insert_rowid())
}

async fn update_article_sqlite(
    pool: &SqlitePool,
    article: &Article,
    expected: ArticleStatus,
    notification: Option<&NewNotification>,
) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(UPDATE_ARTICLE_SQL)
        .bind(&article.title)
        .bind(&article.content)
        .bind(&article.image)
        .bind(article.status.as_str())
        .bind(article.is_approved)
        .bind(&article.rejection_reason)
        .bind(article.reviewed_by)
        .bind(article.reviewed_at)
        .bind(Utc::now())
        .bind(article.id)
        .bind(expected.as_str())
        .execute(&mut *tx)
        .await
        .context("Failed to update article")?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }
    if let Some(notification) = notification {
        insert_notification_sqlite(&mut *tx, notification).await?;
    }

    tx.commit().await.context("Failed to commit article update")?;
    Ok(true)
}

async fn list_articles_sqlite(
    pool: &SqlitePool,
    query: &ArticleQuery,
    params: &ListParams,
) -> Result<(Vec<Article>, i64)> {
    let where_clause = query.where_clause();
    let select_sql = format!(
        "SELECT {} FROM articles{}{} LIMIT ? OFFSET ?",
        ARTICLE_COLUMNS,
        where_clause,
        query.order_clause()
    );
    let count_sql = format!("SELECT COUNT(*) FROM articles{}", where_clause);

    let mut select = sqlx::query(&select_sql);
    let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(status) = query.status {
        select = select.bind(status.as_str());
        count = count.bind(status.as_str());
    }
    if let Some(author_id) = query.author_id {
        select = select.bind(author_id);
        count = count.bind(author_id);
    }

    let rows = select
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list articles")?;
    let total = count
        .fetch_one(pool)
        .await
        .context("Failed to count articles")?;

    let items = rows
        .iter()
        .map(row_to_article_sqlite)
        .collect::<Result<Vec<_>>>()?;
    Ok((items, total))
}

fn row_to_article_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Article> {
    let status: String = row.get("status");

    Ok(Article {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        image: row.get("image"),
        status: parse_status(&status)?,
        is_approved: row.get("is_approved"),
        author_id: row.get("author_id"),
        rejection_reason: row.get("rejection_reason"),
        reviewed_by: row.get("reviewed_by"),
        reviewed_at: row.get("reviewed_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_article_mysql(
    pool: &MySqlPool,
    author_id: i64,
    input: &CreateArticleInput,
    status: ArticleStatus,
) -> Result<i64> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO articles (title, content, image, status, is_approved, author_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(&input.content)
    .bind(&input.image)
    .bind(status.as_str())
    .bind(status == ArticleStatus::Approved)
    .bind(author_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create article")?;

    Ok(result.last_insert_id() as i64)
}

async fn update_article_mysql(
    pool: &MySqlPool,
    article: &Article,
    expected: ArticleStatus,
    notification: Option<&NewNotification>,
) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(UPDATE_ARTICLE_SQL)
        .bind(&article.title)
        .bind(&article.content)
        .bind(&article.image)
        .bind(article.status.as_str())
        .bind(article.is_approved)
        .bind(&article.rejection_reason)
        .bind(article.reviewed_by)
        .bind(article.reviewed_at)
        .bind(Utc::now())
        .bind(article.id)
        .bind(expected.as_str())
        .execute(&mut *tx)
        .await
        .context("Failed to update article")?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }
    if let Some(notification) = notification {
        insert_notification_mysql(&mut *tx, notification).await?;
    }

    tx.commit().await.context("Failed to commit article update")?;
    Ok(true)
}

async fn list_articles_mysql(
    pool: &MySqlPool,
    query: &ArticleQuery,
    params: &ListParams,
) -> Result<(Vec<Article>, i64)> {
    let where_clause = query.where_clause();
    let select_sql = format!(
        "SELECT {} FROM articles{}{} LIMIT ? OFFSET ?",
        ARTICLE_COLUMNS,
        where_clause,
        query.order_clause()
    );
    let count_sql = format!("SELECT COUNT(*) FROM articles{}", where_clause);

    let mut select = sqlx::query(&select_sql);
    let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(status) = query.status {
        select = select.bind(status.as_str());
        count = count.bind(status.as_str());
    }
    if let Some(author_id) = query.author_id {
        select = select.bind(author_id);
        count = count.bind(author_id);
    }

    let rows = select
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list articles")?;
    let total = count
        .fetch_one(pool)
        .await
        .context("Failed to count articles")?;

    let items = rows
        .iter()
        .map(row_to_article_mysql)
        .collect::<Result<Vec<_>>>()?;
    Ok((items, total))
}

fn row_to_article_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Article> {
    let status: String = row.get("status");

    Ok(Article {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        image: row.get("image"),
        status: parse_status(&status)?,
        is_approved: row.get("is_approved"),
        author_id: row.get("author_id"),
        rejection_reason: row.get("rejection_reason"),
        reviewed_by: row.get("reviewed_by"),
        reviewed_at: row.get("reviewed_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
