//! Rate limiter for login attempts
//!
//! Failed logins are tracked per key inside a sliding window. The login
//! handler keys on the account id when the user exists. Limits come from
//! `AuthConfig`.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::AuthConfig;

/// Login rate limiter
pub struct LoginRateLimiter {
    attempts: Arc<RwLock<HashMap<String, Vec<DateTime<Utc>>>>>,
    max_attempts: usize,
    window: Duration,
}

impl LoginRateLimiter {
    /// Create a limiter allowing `max_attempts` failures per `window_minutes`
    pub fn new(max_attempts: usize, window_minutes: i64) -> Self {
        Self {
            attempts: Arc::new(RwLock::new(HashMap::new())),
            max_attempts: max_attempts.max(1),
            window: Duration::minutes(window_minutes.max(1)),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.max_login_attempts, config.login_window_minutes)
    }

    /// Check if the identifier has used up its failed attempts
    pub async fn is_limited(&self, identifier: &str) -> bool {
        let mut attempts = self.attempts.write().await;
        let cutoff = Utc::now() - self.window;

        match attempts.get_mut(&identifier.to_lowercase()) {
            Some(times) => {
                times.retain(|time| *time > cutoff);
                times.len() >= self.max_attempts
            }
            None => false,
        }
    }

    /// Record a failed login attempt
    pub async fn record_failed_attempt(&self, identifier: &str) {
        let mut attempts = self.attempts.write().await;
        attempts
            .entry(identifier.to_lowercase())
            .or_default()
            .push(Utc::now());
    }

    /// Clear failed attempts (on successful login)
    pub async fn clear(&self, identifier: &str) {
        let mut attempts = self.attempts.write().await;
        attempts.remove(&identifier.to_lowercase());
    }

    /// Drop entries whose attempts all fell out of the window
    pub async fn cleanup(&self) -> usize {
        let cutoff = Utc::now() - self.window;
        let mut attempts = self.attempts.write().await;
        let before = attempts.len();
        attempts.retain(|_, times| {
            times.retain(|time| *time > cutoff);
            !times.is_empty()
        });
        before - attempts.len()
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::from_config(&AuthConfig::default())
    }
}
