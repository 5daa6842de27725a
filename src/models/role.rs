//! Role model
//!
//! Exactly two roles exist and both are seeded by the first migration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role row as stored in the `roles` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: RoleName,
    pub created_at: DateTime<Utc>,
}

/// The closed set of role names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleName {
    /// Moderates articles and manages users
    Admin,
    /// Writes and manages own articles
    User,
}

impl Default for RoleName {
    fn default() -> Self {
        Self::User
    }
}

impl RoleName {
    pub const ALL: [RoleName; 2] = [RoleName::Admin, RoleName::User];

    /// Database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::Admin => "admin",
            RoleName::User => "user",
        }
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(RoleName::Admin),
            "user" => Ok(RoleName::User),
            _ => Err(anyhow::anyhow!("Invalid role: {}", s)),
        }
    }
}
