//! Password reset token model

use chrono::{DateTime, Utc};

/// Stored reset token. Only the SHA-256 digest of the token is persisted.
#[derive(Debug, Clone)]
pub struct PasswordResetToken {
    pub id: i64,
    pub user_id: i64,
    /// Lowercase hex SHA-256 of the token handed to the user
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}
