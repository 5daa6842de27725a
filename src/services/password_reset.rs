//! Password reset flow
//!
//! A reset request creates an opaque token, stores only its SHA-256 digest
//! and mails the token to the user. Confirming the reset consumes the token,
//! stores the new password and revokes every session of the account.

use crate::db::repositories::{PasswordResetRepository, UserRepository};
use crate::services::email::EmailService;
use crate::services::user::{UserService, UserServiceError};
use crate::services::validation::normalize_email;
use anyhow::Context;
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

/// Error types for password reset operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordResetError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Unknown, already used or expired token
    #[error("Invalid or expired reset token")]
    InvalidToken,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<UserServiceError> for PasswordResetError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::ValidationError(msg) => PasswordResetError::ValidationError(msg),
            UserServiceError::InternalError(e) => PasswordResetError::InternalError(e),
            other => PasswordResetError::InternalError(anyhow::anyhow!(other.to_string())),
        }
    }
}

/// Lowercase hex SHA-256 of a reset token
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

pub struct PasswordResetService {
    user_repo: Arc<dyn UserRepository>,
    reset_repo: Arc<dyn PasswordResetRepository>,
    users: Arc<UserService>,
    email: Arc<EmailService>,
    ttl_minutes: i64,
}

impl PasswordResetService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        reset_repo: Arc<dyn PasswordResetRepository>,
        users: Arc<UserService>,
        email: Arc<EmailService>,
        ttl_minutes: i64,
    ) -> Self {
        Self {
            user_repo,
            reset_repo,
            users,
            email,
            ttl_minutes: ttl_minutes.max(1),
        }
    }

    /// Start a reset for `email`.
    ///
    /// Returns the raw token when an account matched, `None` otherwise. The
    /// HTTP layer never exposes the difference.
    pub async fn request_reset(&self, email: &str) -> Result<Option<String>, PasswordResetError> {
        let email = normalize_email(email).map_err(PasswordResetError::ValidationError)?;

        let user = match self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to look up user")?
        {
            Some(user) if !user.is_banned() => user,
            _ => {
                tracing::debug!("Password reset requested for unknown or banned account");
                return Ok(None);
            }
        };

        self.reset_repo
            .delete_by_user(user.id)
            .await
            .context("Failed to remove previous reset tokens")?;

        let token = Uuid::new_v4().simple().to_string();
        let expires_at = Utc::now() + Duration::minutes(self.ttl_minutes);
        self.reset_repo
            .create(user.id, &hash_token(&token), expires_at)
            .await
            .context("Failed to store reset token")?;

        if let Err(e) = self
            .email
            .send_password_reset(&user.email, &token, self.ttl_minutes)
            .await
        {
            tracing::error!("Failed to send password reset email to user {}: {:#}", user.id, e);
        }

        tracing::info!("Password reset token issued for user {}", user.id);
        Ok(Some(token))
    }

    /// Consume `token` and set `new_password`
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), PasswordResetError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(PasswordResetError::InvalidToken);
        }

        let stored = self
            .reset_repo
            .get_by_hash(&hash_token(token))
            .await
            .context("Failed to look up reset token")?
            .ok_or(PasswordResetError::InvalidToken)?;

        if stored.is_expired() {
            self.reset_repo
                .delete(stored.id)
                .await
                .context("Failed to delete expired reset token")?;
            return Err(PasswordResetError::InvalidToken);
        }

        self.users.set_password(stored.user_id, new_password).await?;

        self.reset_repo
            .delete_by_user(stored.user_id)
            .await
            .context("Failed to consume reset token")?;
        let revoked = self.users.revoke_sessions(stored.user_id).await?;

        tracing::info!(
            "Password reset completed for user {} ({} session(s) revoked)",
            stored.user_id,
            revoked
        );
        Ok(())
    }
}
