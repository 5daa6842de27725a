//! Role repository
//!
//! Read access to the seeded `roles` table.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Role, RoleName};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Role repository trait
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// All roles ordered by id
    async fn list(&self) -> Result<Vec<Role>>;

    /// Get role by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Role>>;

    /// Get role by name
    async fn get_by_name(&self, name: RoleName) -> Result<Option<Role>>;
}

/// SQLx-based role repository implementation
pub struct SqlxRoleRepository {
    pool: DynDatabasePool,
}

impl SqlxRoleRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn RoleRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl RoleRepository for SqlxRoleRepository {
    async fn list(&self) -> Result<Vec<Role>> {
        let sql = "SELECT id, name, created_at FROM roles ORDER BY id";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(sql)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list roles")?;
                rows.iter().map(row_to_role_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(sql)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list roles")?;
                rows.iter().map(row_to_role_mysql).collect()
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Role>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_role_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_role_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn get_by_name(&self, name: RoleName) -> Result<Option<Role>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_role_by_name_sqlite(self.pool.sqlite()?, name).await,
            DatabaseDriver::Mysql => get_role_by_name_mysql(self.pool.mysql()?, name).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_role_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Role>> {
    let row = sqlx::query("SELECT id, name, created_at FROM roles WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get role by ID")?;

    row.as_ref().map(row_to_role_sqlite).transpose()
}

async fn get_role_by_name_sqlite(pool: &SqlitePool, name: RoleName) -> Result<Option<Role>> {
    let row = sqlx::query("SELECT id, name, created_at FROM roles WHERE name = ?")
        .bind(name.as_str())
        .fetch_optional(pool)
        .await
        .context("Failed to get role by name")?;

    row.as_ref().map(row_to_role_sqlite).transpose()
}

fn row_to_role_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Role> {
    let name: String = row.get("name");
    Ok(Role {
        id: row.get("id"),
        name: RoleName::from_str(&name)?,
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_role_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Role>> {
    let row = sqlx::query("SELECT id, name, created_at FROM roles WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get role by ID")?;

    row.as_ref().map(row_to_role_mysql).transpose()
}

async fn get_role_by_name_mysql(pool: &MySqlPool, name: RoleName) -> Result<Option<Role>> {
    let row = sqlx::query("SELECT id, name, created_at FROM roles WHERE name = ?")
        .bind(name.as_str())
        .fetch_optional(pool)
        .await
        .context("Failed to get role by name")?;

    row.as_ref().map(row_to_role_mysql).transpose()
}

fn row_to_role_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Role> {
    let name: String = row.get("name");
    Ok(Role {
        id: row.get("id"),
        name: RoleName::from_str(&name)?,
        created_at: row.get("created_at"),
    })
}
