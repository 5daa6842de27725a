//! Notification service
//!
//! In-app notifications raised by moderation and role changes.

use crate::db::repositories::NotificationRepository;
use crate::models::{ListParams, NewNotification, Notification, PagedResult};
use anyhow::Context;
use std::sync::Arc;

/// Error types for notification operations
#[derive(Debug, thiserror::Error)]
pub enum NotificationServiceError {
    #[error("Notification not found: {0}")]
    NotFound(i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Notification service
pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationRepository>) -> Self {
        Self { repo }
    }

    /// Store a standalone notification.
    ///
    /// Reviews and role changes store theirs in the same transaction as the
    /// change, see `ArticleRepository::update` and `UserRepository::set_role`.
    pub async fn notify(
        &self,
        input: NewNotification,
    ) -> Result<Notification, NotificationServiceError> {
        let notification = self
            .repo
            .create(&input)
            .await
            .context("Failed to create notification")?;

        tracing::debug!(
            "Notification {} ({}) sent to user {}",
            notification.id,
            notification.kind,
            notification.user_id
        );
        Ok(notification)
    }

    /// Notifications for a user, newest first
    pub async fn list(
        &self,
        user_id: i64,
        unread_only: bool,
        params: &ListParams,
    ) -> Result<PagedResult<Notification>, NotificationServiceError> {
        let page = self
            .repo
            .list_for_user(user_id, unread_only, params)
            .await
            .context("Failed to list notifications")?;
        Ok(page)
    }

    pub async fn unread_count(&self, user_id: i64) -> Result<i64, NotificationServiceError> {
        let count = self
            .repo
            .unread_count(user_id)
            .await
            .context("Failed to count unread notifications")?;
        Ok(count)
    }

    /// Mark one of the user's notifications as read
    pub async fn mark_read(&self, user_id: i64, id: i64) -> Result<(), NotificationServiceError> {
        let found = self
            .repo
            .mark_read(user_id, id)
            .await
            .context("Failed to mark notification read")?;
        if !found {
            return Err(NotificationServiceError::NotFound(id));
        }
        Ok(())
    }

    pub async fn mark_all_read(&self, user_id: i64) -> Result<u64, NotificationServiceError> {
        let updated = self
            .repo
            .mark_all_read(user_id)
            .await
            .context("Failed to mark notifications read")?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};
    use crate::db::repositories::SqlxNotificationRepository;
    use crate::models::{NotificationKind, RoleName};

    #[tokio::test]
    async fn test_role_changed_message() {
        let pool = setup_pool().await;
        let user = insert_user(&pool, "promoted", Some(RoleName::User)).await;
        let service = NotificationService::new(SqlxNotificationRepository::boxed(pool));

        let n = service
            .notify(NewNotification::role_changed(user, RoleName::Admin))
            .await
            .unwrap();
        assert_eq!(n.kind, NotificationKind::RoleChanged);
        assert!(n.message.contains("admin"));
        assert_eq!(service.unread_count(user).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_read_of_foreign_notification_is_not_found() {
        let pool = setup_pool().await;
        let owner = insert_user(&pool, "owner", Some(RoleName::User)).await;
        let stranger = insert_user(&pool, "stranger", Some(RoleName::User)).await;
        let service = NotificationService::new(SqlxNotificationRepository::boxed(pool));

        let n = service
            .notify(NewNotification::role_changed(owner, RoleName::User))
            .await
            .unwrap();

        assert!(matches!(
            service.mark_read(stranger, n.id).await,
            Err(NotificationServiceError::NotFound(_))
        ));
        service.mark_read(owner, n.id).await.unwrap();
        assert_eq!(service.unread_count(owner).await.unwrap(), 0);
    }
}
