//! User service
//!
//! Implements business logic for user management:
//! - Registration with field validation (first user becomes admin)
//! - Login/logout and session management
//! - Profile and password changes
//! - Admin role and status changes
//! - Role resolution for `getUserWithRole`

use crate::config::AuthConfig;
use crate::db::repositories::{RoleRepository, SessionRepository, UserRepository};
use crate::models::{
    ListParams, NewNotification, NewUser, PagedResult, Role, RoleName, Session,
    UpdateProfileInput, User, UserStatus,
};
use crate::services::password::{hash_password, verify_password};
use crate::services::validation::{normalize_email, validate_password, validate_username};
use anyhow::Context;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

const MAX_FULL_NAME_LENGTH: usize = 100;
const MAX_PICTURE_URL_LENGTH: usize = 500;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// User already exists
    #[error("User already exists: {0}")]
    UserExists(String),

    /// Account is banned
    #[error("Your account has been banned. Please contact the administrator.")]
    UserBanned,

    #[error("User not found: {0}")]
    NotFound(i64),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Input for user registration
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

impl RegisterInput {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            full_name: None,
        }
    }
}

/// Input for user login
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    /// Username or email
    pub username_or_email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username_or_email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username_or_email: username_or_email.into(),
            password: password.into(),
        }
    }
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    role_repo: Arc<dyn RoleRepository>,
    auth: AuthConfig,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        role_repo: Arc<dyn RoleRepository>,
        auth: AuthConfig,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            role_repo,
            auth,
        }
    }

    /// Session lifetime in seconds, used for the cookie `Max-Age`
    pub fn session_max_age_secs(&self) -> i64 {
        self.auth.session_expiration_days * 24 * 60 * 60
    }

    /// Register a new user.
    ///
    /// The first account in an empty system is given the admin role, every
    /// later account the user role.
    ///
    /// # Errors
    ///
    /// - `ValidationError` for a malformed username, email or weak password
    /// - `UserExists` if username or email is already taken
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        validate_username(&username).map_err(UserServiceError::ValidationError)?;
        let email = normalize_email(&input.email).map_err(UserServiceError::ValidationError)?;
        validate_password(&input.password, self.auth.min_password_length)
            .map_err(UserServiceError::ValidationError)?;
        let full_name = clean_optional(input.full_name, MAX_FULL_NAME_LENGTH, "Full name")?;

        if self
            .user_repo
            .get_by_username(&username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                username
            )));
        }

        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let role = if self.is_first_user().await? {
            RoleName::Admin
        } else {
            RoleName::User
        };

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;

        let user = self
            .user_repo
            .create(&NewUser {
                username,
                email,
                password_hash,
                full_name,
                role,
            })
            .await
            .context("Failed to create user")?;

        tracing::info!("Registered user {} ({}) as {}", user.username, user.id, role);
        Ok(user)
    }

    /// Login with username or email.
    ///
    /// Unknown identifiers and wrong passwords produce the same error.
    pub async fn login(&self, input: LoginInput) -> Result<(Session, User), UserServiceError> {
        let invalid =
            || UserServiceError::AuthenticationError("Invalid username or password".to_string());

        let user = self
            .find_user_by_username_or_email(&input.username_or_email)
            .await?
            .ok_or_else(invalid)?;

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !password_valid {
            return Err(invalid());
        }

        if user.is_banned() {
            return Err(UserServiceError::UserBanned);
        }

        let session = self.create_session(user.id).await?;
        Ok((session, user))
    }

    /// Logout (invalidate session)
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Validate a session token and return its user.
    ///
    /// Expired sessions are deleted on the spot. Banned users get `None`.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user.filter(|u| !u.is_banned()))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        let user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?;
        Ok(user)
    }

    async fn require_user(&self, id: i64) -> Result<User, UserServiceError> {
        self.get_by_id(id)
            .await?
            .ok_or(UserServiceError::NotFound(id))
    }

    /// Update display name and avatar. Absent fields are kept; empty strings clear.
    pub async fn update_profile(
        &self,
        user_id: i64,
        input: UpdateProfileInput,
    ) -> Result<User, UserServiceError> {
        let current = self.require_user(user_id).await?;

        let full_name = match input.full_name {
            Some(name) => clean_optional(Some(name), MAX_FULL_NAME_LENGTH, "Full name")?,
            None => current.full_name,
        };
        let profile_picture = match input.profile_picture {
            Some(url) => clean_optional(Some(url), MAX_PICTURE_URL_LENGTH, "Profile picture")?,
            None => current.profile_picture,
        };

        self.user_repo
            .update_profile(user_id, full_name.as_deref(), profile_picture.as_deref())
            .await
            .context("Failed to update profile")?;

        self.require_user(user_id).await
    }

    /// Change password after checking the current one.
    ///
    /// Every other session of the user is revoked; `keep_session` survives.
    pub async fn change_password(
        &self,
        user_id: i64,
        keep_session: Option<&str>,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), UserServiceError> {
        let user = self.require_user(user_id).await?;

        let valid = verify_password(current_password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            return Err(UserServiceError::AuthenticationError(
                "Current password is incorrect".to_string(),
            ));
        }

        self.set_password(user_id, new_password).await?;

        let revoked = match keep_session {
            Some(keep) => self.session_repo.delete_by_user_except(user_id, keep).await,
            None => self.session_repo.delete_by_user(user_id).await,
        }
        .context("Failed to revoke sessions")?;

        tracing::info!(
            "User {} changed password, {} other session(s) revoked",
            user_id,
            revoked
        );
        Ok(())
    }

    /// Validate and store a new password without checking the old one
    pub async fn set_password(&self, user_id: i64, new_password: &str) -> Result<(), UserServiceError> {
        validate_password(new_password, self.auth.min_password_length)
            .map_err(UserServiceError::ValidationError)?;

        let hash = hash_password(new_password).context("Failed to hash password")?;
        self.user_repo
            .update_password(user_id, &hash)
            .await
            .context("Failed to update password")?;
        Ok(())
    }

    /// Revoke every session of a user
    pub async fn revoke_sessions(&self, user_id: i64) -> Result<u64, UserServiceError> {
        let revoked = self
            .session_repo
            .delete_by_user(user_id)
            .await
            .context("Failed to revoke sessions")?;
        Ok(revoked)
    }

    pub async fn list_users(&self, params: &ListParams) -> Result<PagedResult<User>, UserServiceError> {
        let page = self
            .user_repo
            .list(params)
            .await
            .context("Failed to list users")?;
        Ok(page)
    }

    pub async fn count_users(&self) -> Result<i64, UserServiceError> {
        Ok(self.user_repo.count().await.context("Failed to count users")?)
    }

    /// Admin: change another user's role and notify them.
    pub async fn set_role(
        &self,
        actor: &User,
        target_id: i64,
        role: RoleName,
    ) -> Result<User, UserServiceError> {
        if !actor.is_admin() {
            return Err(UserServiceError::Forbidden("Admin access required".to_string()));
        }
        if actor.id == target_id && role != RoleName::Admin {
            return Err(UserServiceError::Forbidden(
                "You cannot remove your own admin role".to_string(),
            ));
        }

        let target = self.require_user(target_id).await?;
        if target.role == Some(role) {
            return Ok(target);
        }

        // Role and notification commit in one transaction.
        self.user_repo
            .set_role(target_id, role, &NewNotification::role_changed(target_id, role))
            .await
            .context("Failed to set role")?;

        tracing::info!(
            "Admin {} changed role of user {} to {}",
            actor.id,
            target_id,
            role
        );
        self.require_user(target_id).await
    }

    /// Admin: ban or reactivate a user. Banning revokes all their sessions.
    pub async fn set_status(
        &self,
        actor: &User,
        target_id: i64,
        status: UserStatus,
    ) -> Result<User, UserServiceError> {
        if !actor.is_admin() {
            return Err(UserServiceError::Forbidden("Admin access required".to_string()));
        }
        if actor.id == target_id && status == UserStatus::Banned {
            return Err(UserServiceError::Forbidden("You cannot ban yourself".to_string()));
        }

        self.require_user(target_id).await?;
        self.user_repo
            .set_status(target_id, status)
            .await
            .context("Failed to set status")?;

        if status == UserStatus::Banned {
            let revoked = self.revoke_sessions(target_id).await?;
            tracing::info!(
                "Admin {} banned user {} ({} session(s) revoked)",
                actor.id,
                target_id,
                revoked
            );
        } else {
            tracing::info!("Admin {} set user {} to {}", actor.id, target_id, status);
        }

        self.require_user(target_id).await
    }

    /// Resolve a user together with their role row.
    ///
    /// Without `user_id` the caller is resolved. Only admins may resolve
    /// other users.
    pub async fn get_user_with_role(
        &self,
        caller: &User,
        user_id: Option<i64>,
    ) -> Result<(User, Option<Role>), UserServiceError> {
        let target = match user_id {
            Some(id) if id != caller.id => {
                if !caller.is_admin() {
                    return Err(UserServiceError::Forbidden(
                        "Only admins can look up other users".to_string(),
                    ));
                }
                self.require_user(id).await?
            }
            _ => caller.clone(),
        };

        let role = match target.role_id {
            Some(role_id) => self
                .role_repo
                .get_by_id(role_id)
                .await
                .context("Failed to load role")?,
            None => None,
        };

        Ok((target, role))
    }

    /// Check if this is the first user (for auto-admin)
    pub async fn is_first_user(&self) -> Result<bool, UserServiceError> {
        let count = self
            .user_repo
            .count()
            .await
            .context("Failed to count users")?;
        Ok(count == 0)
    }

    /// Look a user up by username, falling back to email when the input has an `@`
    pub async fn find_user_by_username_or_email(
        &self,
        username_or_email: &str,
    ) -> Result<Option<User>, UserServiceError> {
        let identifier = username_or_email.trim();

        if let Some(user) = self
            .user_repo
            .get_by_username(identifier)
            .await
            .context("Failed to get user by username")?
        {
            return Ok(Some(user));
        }

        if identifier.contains('@') {
            let user = self
                .user_repo
                .get_by_email(identifier)
                .await
                .context("Failed to get user by email")?;
            return Ok(user);
        }

        Ok(None)
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + Duration::days(self.auth.session_expiration_days),
            created_at: now,
        };

        let session = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;
        Ok(session)
    }
}

/// Trim an optional text field, mapping blank to `None` and enforcing a length cap
fn clean_optional(
    value: Option<String>,
    max_len: usize,
    field: &str,
) -> Result<Option<String>, UserServiceError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if v.is_empty() => Ok(None),
        Some(v) if v.chars().count() > max_len => Err(UserServiceError::ValidationError(format!(
            "{} must be at most {} characters",
            field, max_len
        ))),
        other => Ok(other),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::repositories::{SqlxRoleRepository, SqlxSessionRepository, SqlxUserRepository};
    use crate::db::DynDatabasePool;

    pub fn user_service(pool: &DynDatabasePool) -> UserService {
        UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            SqlxRoleRepository::boxed(pool.clone()),
            AuthConfig::default(),
        )
    }
}
