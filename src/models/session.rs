//! Session model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bearer session issued at login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque token (UUID v4)
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    /// Seconds until expiry, clamped at zero
    pub fn remaining_secs(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }
}
