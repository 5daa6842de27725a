//! User model
//!
//! A registered account. The role is a nullable pointer into the `roles`
//! table; rows created before roles existed may still carry no role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::RoleName;

/// User entity representing a registered user in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address (unique, lowercased)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Display name
    pub full_name: Option<String>,
    /// Avatar URL
    pub profile_picture: Option<String>,
    /// Pointer into the roles table
    pub role_id: Option<i64>,
    /// Role name resolved through `role_id`
    pub role: Option<RoleName>,
    /// User status (active/banned)
    pub status: UserStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Check if the user is an administrator.
    ///
    /// A user without a role pointer is never an administrator.
    pub fn is_admin(&self) -> bool {
        self.role == Some(RoleName::Admin)
    }

    /// Role used for authorization decisions
    pub fn effective_role(&self) -> RoleName {
        self.role.unwrap_or_default()
    }

    /// Authors may manage their own articles, admins may manage any.
    pub fn can_manage(&self, author_id: i64) -> bool {
        self.is_admin() || self.id == author_id
    }

    /// Check if the user is banned
    pub fn is_banned(&self) -> bool {
        self.status == UserStatus::Banned
    }
}

/// User status for account state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// Active - normal access
    Active,
    /// Banned - cannot login
    Banned,
}

impl Default for UserStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Banned => "banned",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(UserStatus::Active),
            "banned" => Ok(UserStatus::Banned),
            _ => Err(anyhow::anyhow!("Invalid user status: {}", s)),
        }
    }
}

/// Row values for inserting a user. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: RoleName,
}

/// Profile fields a user may change on their own account
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileInput {
    pub full_name: Option<String>,
    pub profile_picture: Option<String>,
}

#[cfg(test)]
pub(crate) fn sample_user(id: i64, role: Option<RoleName>) -> User {
    let now = Utc::now();
    User {
        id,
        username: format!("user{}", id),
        email: format!("user{}@example.com", id),
        password_hash: "hash".to_string(),
        full_name: None,
        profile_picture: None,
        role_id: role.map(|r| if r == RoleName::Admin { 1 } else { 2 }),
        role,
        status: UserStatus::Active,
        created_at: now,
        updated_at: now,
    }
}
