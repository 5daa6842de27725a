//! Maintenance jobs
//!
//! - Expired token cleanup, run on an interval from `main`
//! - Role pointer backfill and verification, run by the `backfill-roles` binary

use crate::db::repositories::{PasswordResetRepository, SessionRepository, UserRepository};
use crate::models::RoleName;
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

/// Rows removed by one cleanup run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub reset_tokens: u64,
    pub sessions: u64,
}

/// State of the user → role pointer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleReport {
    pub total_users: i64,
    pub without_role: i64,
    pub by_role: Vec<(RoleName, i64)>,
}

impl RoleReport {
    pub fn is_complete(&self) -> bool {
        self.without_role == 0
    }
}

pub struct MaintenanceService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    reset_repo: Arc<dyn PasswordResetRepository>,
}

impl MaintenanceService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        reset_repo: Arc<dyn PasswordResetRepository>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            reset_repo,
        }
    }

    /// Delete expired password reset tokens and sessions
    pub async fn clean_expired_tokens(&self) -> Result<CleanupReport> {
        let reset_tokens = self
            .reset_repo
            .delete_expired()
            .await
            .context("Failed to clean expired reset tokens")?;
        let sessions = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to clean expired sessions")?;

        let report = CleanupReport {
            reset_tokens,
            sessions,
        };
        if reset_tokens > 0 || sessions > 0 {
            tracing::info!(
                "Cleaned {} expired reset token(s) and {} expired session(s)",
                reset_tokens,
                sessions
            );
        } else {
            tracing::debug!("No expired tokens to clean");
        }
        Ok(report)
    }

    /// Give every user without a role pointer the `user` role
    pub async fn backfill_role_ids(&self) -> Result<u64> {
        let updated = self
            .user_repo
            .backfill_missing_roles(RoleName::User)
            .await
            .context("Failed to backfill role pointers")?;
        tracing::info!("Backfilled role pointer for {} user(s)", updated);
        Ok(updated)
    }

    /// Read-only report on role pointers
    pub async fn verify_role_ids(&self) -> Result<RoleReport> {
        Ok(RoleReport {
            total_users: self.user_repo.count().await?,
            without_role: self.user_repo.count_without_role().await?,
            by_role: self.user_repo.count_by_role().await?,
        })
    }
}
