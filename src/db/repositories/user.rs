//! User repository
//!
//! Database operations for users.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL
//!
//! Every read joins `roles` so the returned `User` carries its role name.

use crate::config::DatabaseDriver;
use crate::db::repositories::notification::{insert_notification_mysql, insert_notification_sqlite};
use crate::db::DynDatabasePool;
use crate::models::{
    ListParams, NewNotification, NewUser, PagedResult, RoleName, User, UserStatus,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

const USER_SELECT: &str = r#"
    SELECT u.id, u.username, u.email, u.password_hash, u.full_name, u.profile_picture,
           u.role_id, r.name AS role_name, u.status, u.created_at, u.updated_at
    FROM users u
    LEFT JOIN roles r ON r.id = u.role_id
"#;

const INSERT_USER: &str = r#"
    INSERT INTO users (username, email, password_hash, full_name, role_id, status, created_at, updated_at)
    VALUES (?, ?, ?, ?, (SELECT id FROM roles WHERE name = ?), ?, ?, ?)
"#;

const SET_ROLE_SQL: &str =
    "UPDATE users SET role_id = (SELECT id FROM roles WHERE name = ?), updated_at = ? WHERE id = ?";

const COUNT_BY_ROLE: &str = r#"
    SELECT r.name AS role_name, COUNT(u.id) AS count
    FROM roles r
    LEFT JOIN users u ON u.role_id = r.id
    GROUP BY r.id, r.name
    ORDER BY r.id
"#;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &NewUser) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Update display name and avatar
    async fn update_profile(
        &self,
        id: i64,
        full_name: Option<&str>,
        profile_picture: Option<&str>,
    ) -> Result<()>;

    /// Replace the stored password hash
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()>;

    /// Point the user at the named role and store `notification` in the
    /// same transaction
    async fn set_role(
        &self,
        id: i64,
        role: RoleName,
        notification: &NewNotification,
    ) -> Result<()>;

    /// Change account status
    async fn set_status(&self, id: i64, status: UserStatus) -> Result<()>;

    /// Count total users
    async fn count(&self) -> Result<i64>;

    /// List users, newest first
    async fn list(&self, params: &ListParams) -> Result<PagedResult<User>>;

    /// Count users whose role pointer is NULL
    async fn count_without_role(&self) -> Result<i64>;

    /// Point every user with a NULL role at `role`, returning rows updated
    async fn backfill_missing_roles(&self, role: RoleName) -> Result<u64>;

    /// Number of users per role, including roles with no users
    async fn count_by_role(&self) -> Result<Vec<(RoleName, i64)>>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &NewUser) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(self.pool.sqlite()?, user).await,
            DatabaseDriver::Mysql => create_user_mysql(self.pool.mysql()?, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("{} WHERE u.id = ?", USER_SELECT);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get user by ID")?;
                row.as_ref().map(row_to_user_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get user by ID")?;
                row.as_ref().map(row_to_user_mysql).transpose()
            }
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_by_field_sqlite(self.pool.sqlite()?, "username", username).await
            }
            DatabaseDriver::Mysql => {
                get_user_by_field_mysql(self.pool.mysql()?, "username", username).await
            }
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.trim().to_lowercase();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_by_field_sqlite(self.pool.sqlite()?, "email", &email).await
            }
            DatabaseDriver::Mysql => {
                get_user_by_field_mysql(self.pool.mysql()?, "email", &email).await
            }
        }
    }

    async fn update_profile(
        &self,
        id: i64,
        full_name: Option<&str>,
        profile_picture: Option<&str>,
    ) -> Result<()> {
        let sql = "UPDATE users SET full_name = ?, profile_picture = ?, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(full_name)
                    .bind(profile_picture)
                    .bind(now)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update user profile")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(full_name)
                    .bind(profile_picture)
                    .bind(now)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update user profile")?;
            }
        }
        Ok(())
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()> {
        let sql = "UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(password_hash)
                    .bind(now)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update password")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(password_hash)
                    .bind(now)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update password")?;
            }
        }
        Ok(())
    }

    async fn set_role(
        &self,
        id: i64,
        role: RoleName,
        notification: &NewNotification,
    ) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_role_sqlite(self.pool.sqlite()?, id, role, notification).await
            }
            DatabaseDriver::Mysql => set_role_mysql(self.pool.mysql()?, id, role, notification).await,
        }
    }

    async fn set_status(&self, id: i64, status: UserStatus) -> Result<()> {
        let sql = "UPDATE users SET status = ?, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(status.as_str())
                    .bind(now)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to set user status")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(status.as_str())
                    .bind(now)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to set user status")?;
            }
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        self.scalar_count("SELECT COUNT(*) FROM users").await
    }

    async fn list(&self, params: &ListParams) -> Result<PagedResult<User>> {
        let sql = format!("{} ORDER BY u.created_at DESC, u.id DESC LIMIT ? OFFSET ?", USER_SELECT);
        let items = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list users")?;
                rows.iter().map(row_to_user_sqlite).collect::<Result<Vec<_>>>()?
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list users")?;
                rows.iter().map(row_to_user_mysql).collect::<Result<Vec<_>>>()?
            }
        };
        let total = self.count().await?;
        Ok(PagedResult::new(items, total, params))
    }

    async fn count_without_role(&self) -> Result<i64> {
        self.scalar_count("SELECT COUNT(*) FROM users WHERE role_id IS NULL")
            .await
    }

    async fn backfill_missing_roles(&self, role: RoleName) -> Result<u64> {
        let sql = "UPDATE users SET role_id = (SELECT id FROM roles WHERE name = ?) WHERE role_id IS NULL";
        let result = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(role.as_str())
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to backfill user roles")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(role.as_str())
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to backfill user roles")?
                .rows_affected(),
        };
        Ok(result)
    }

    async fn count_by_role(&self) -> Result<Vec<(RoleName, i64)>> {
        let pairs: Vec<(String, i64)> = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(COUNT_BY_ROLE)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to count users by role")?
                .iter()
                .map(|row| (row.get("role_name"), row.get("count")))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(COUNT_BY_ROLE)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to count users by role")?
                .iter()
                .map(|row| (row.get("role_name"), row.get("count")))
                .collect(),
        };

        pairs
            .into_iter()
            .map(|(name, count)| Ok((RoleName::from_str(&name)?, count)))
            .collect()
    }
}

impl SqlxUserRepository {
    async fn scalar_count(&self, sql: &str) -> Result<i64> {
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(sql)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count users")?,
            DatabaseDriver::Mysql => sqlx::query_scalar(sql)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count users")?,
        };
        Ok(count)
    }
}

fn parse_status(status: &str) -> UserStatus {
    UserStatus::from_str(status).unwrap_or_default()
}

// Unknown role names are treated like a missing pointer.
fn parse_role(name: Option<String>) -> Option<RoleName> {
    name.and_then(|n| RoleName::from_str(&n).ok())
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &NewUser) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(INSERT_USER)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .bind(UserStatus::Active.as_str())
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create user")?;

    let id = result.last_insert_rowid();
    let row = sqlx::query(&format!("{} WHERE u.id = ?", USER_SELECT))
        .bind(id)
        .fetch_one(pool)
        .await
        .context("Failed to load created user")?;
    row_to_user_sqlite(&row)
}

async fn get_user_by_field_sqlite(
    pool: &SqlitePool,
    field: &'static str,
    value: &str,
) -> Result<Option<User>> {
    let row = sqlx::query(&format!("{} WHERE u.{} = ?", USER_SELECT, field))
        .bind(value)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get user by {}", field))?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let status: String = row.get("status");

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        full_name: row.get("full_name"),
        profile_picture: row.get("profile_picture"),
        role_id: row.get("role_id"),
        role: parse_role(row.get("role_name")),
        status: parse_status(&status),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

async fn set_role_sqlite(
    pool: &SqlitePool,
    id: i64,
    role: RoleName,
    notification: &NewNotification,
) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    sqlx::query(SET_ROLE_SQL)
        .bind(role.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to set user role")?;
    insert_notification_sqlite(&mut *tx, notification).await?;
    tx.commit().await.context("Failed to commit role change")?;
    Ok(())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &NewUser) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(INSERT_USER)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .bind(UserStatus::Active.as_str())
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create user")?;

    let id = result.last_insert_id() as i64;
    let row = sqlx::query(&format!("{} WHERE u.id = ?", USER_SELECT))
        .bind(id)
        .fetch_one(pool)
        .await
        .context("Failed to load created user")?;
    row_to_user_mysql(&row)
}

async fn get_user_by_field_mysql(
    pool: &MySqlPool,
    field: &'static str,
    value: &str,
) -> Result<Option<User>> {
    let row = sqlx::query(&format!("{} WHERE u.{} = ?", USER_SELECT, field))
        .bind(value)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get user by {}", field))?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let status: String = row.get("status");

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        full_name: row.get("full_name"),
        profile_picture: row.get("profile_picture"),
        role_id: row.get("role_id"),
        role: parse_role(row.get("role_name")),
        status: parse_status(&status),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

async fn set_role_mysql(
    pool: &MySqlPool,
    id: i64,
    role: RoleName,
    notification: &NewNotification,
) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    sqlx::query(SET_ROLE_SQL)
        .bind(role.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to set user role")?;
    insert_notification_mysql(&mut *tx, notification).await?;
    tx.commit().await.context("Failed to commit role change")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};

    fn new_user(name: &str, role: RoleName) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: format!("{}@example.com", name),
            password_hash: "hash".to_string(),
            full_name: Some(format!("{} Example", name)),
            role,
        }
    }

    #[tokio::test]
    async fn test_create_user_resolves_role() {
        let pool = setup_pool().await;
        let repo = SqlxUserRepository::new(pool);

        let user = repo
            .create(&new_user("alice", RoleName::Admin))
            .await
            .expect("Failed to create user");

        assert!(user.id > 0);
        assert!(user.role_id.is_some());
        assert_eq!(user.role, Some(RoleName::Admin));
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.full_name.as_deref(), Some("alice Example"));
    }

    #[tokio::test]
    async fn test_duplicate_username_fails() {
        let pool = setup_pool().await;
        let repo = SqlxUserRepository::new(pool);

        repo.create(&new_user("bob", RoleName::User)).await.expect("first insert");
        let mut dup = new_user("bob", RoleName::User);
        dup.email = "other@example.com".to_string();
        assert!(repo.create(&dup).await.is_err());
    }

    #[tokio::test]
    async fn test_lookup_by_username_and_email() {
        let pool = setup_pool().await;
        let repo = SqlxUserRepository::new(pool);
        repo.create(&new_user("carol", RoleName::User)).await.expect("insert");

        let by_name = repo.get_by_username("carol").await.unwrap().expect("found");
        let by_email = repo
            .get_by_email("  CAROL@example.com ")
            .await
            .unwrap()
            .expect("found");
        assert_eq!(by_name.id, by_email.id);
        assert!(repo.get_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_role_and_status() {
        let pool = setup_pool().await;
        let repo = SqlxUserRepository::new(pool);
        let user = repo.create(&new_user("dave", RoleName::User)).await.unwrap();

        repo.set_role(
            user.id,
            RoleName::Admin,
            &NewNotification::role_changed(user.id, RoleName::Admin),
        )
        .await
        .unwrap();
        repo.set_status(user.id, UserStatus::Banned).await.unwrap();

        let reloaded = repo.get_by_id(user.id).await.unwrap().expect("found");
        assert!(reloaded.is_admin());
        assert!(reloaded.is_banned());
    }

    #[tokio::test]
    async fn test_update_profile_and_password() {
        let pool = setup_pool().await;
        let repo = SqlxUserRepository::new(pool);
        let user = repo.create(&new_user("erin", RoleName::User)).await.unwrap();

        repo.update_profile(user.id, None, Some("https://img.example.com/e.png"))
            .await
            .unwrap();
        repo.update_password(user.id, "new-hash").await.unwrap();

        let reloaded = repo.get_by_id(user.id).await.unwrap().expect("found");
        assert_eq!(reloaded.full_name, None);
        assert_eq!(
            reloaded.profile_picture.as_deref(),
            Some("https://img.example.com/e.png")
        );
        assert_eq!(reloaded.password_hash, "new-hash");
    }

    #[tokio::test]
    async fn test_list_paginates() {
        let pool = setup_pool().await;
        let repo = SqlxUserRepository::new(pool);
        for i in 0..5 {
            repo.create(&new_user(&format!("user{}", i), RoleName::User))
                .await
                .unwrap();
        }

        let page = repo.list(&ListParams::new(2, 2)).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_pages(), 3);
    }

    #[tokio::test]
    async fn test_backfill_missing_roles() {
        let pool = setup_pool().await;
        let repo = SqlxUserRepository::new(pool.clone());

        repo.create(&new_user("ranked", RoleName::Admin)).await.unwrap();
        let legacy_a = insert_user(&pool, "legacy_a", None).await;
        insert_user(&pool, "legacy_b", None).await;

        let legacy = repo.get_by_id(legacy_a).await.unwrap().expect("found");
        assert_eq!(legacy.role, None);
        assert!(!legacy.is_admin());

        assert_eq!(repo.count_without_role().await.unwrap(), 2);
        assert_eq!(repo.backfill_missing_roles(RoleName::User).await.unwrap(), 2);
        assert_eq!(repo.count_without_role().await.unwrap(), 0);
        assert_eq!(repo.backfill_missing_roles(RoleName::User).await.unwrap(), 0);

        let counts = repo.count_by_role().await.unwrap();
        assert_eq!(counts, vec![(RoleName::Admin, 1), (RoleName::User, 2)]);
    }
}
