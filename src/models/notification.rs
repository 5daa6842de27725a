//! Notification model

use super::{Article, RoleName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// In-app notification for a single recipient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    /// Recipient
    pub user_id: i64,
    pub kind: NotificationKind,
    pub message: String,
    /// Article the notification is about, if any
    pub article_id: Option<i64>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// What triggered the notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ArticleApproved,
    ArticleRejected,
    RoleChanged,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ArticleApproved => "article_approved",
            NotificationKind::ArticleRejected => "article_rejected",
            NotificationKind::RoleChanged => "role_changed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "article_approved" => Some(NotificationKind::ArticleApproved),
            "article_rejected" => Some(NotificationKind::ArticleRejected),
            "role_changed" => Some(NotificationKind::RoleChanged),
            _ => None,
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values for inserting a notification
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub kind: NotificationKind,
    pub message: String,
    pub article_id: Option<i64>,
}

impl NewNotification {
    /// Tell the author their article went live
    pub fn article_approved(article: &Article) -> Self {
        Self {
            user_id: article.author_id,
            kind: NotificationKind::ArticleApproved,
            message: format!("Your article \"{}\" has been approved.", article.title),
            article_id: Some(article.id),
        }
    }

    /// Tell the author their article was rejected, with the reason when given
    pub fn article_rejected(article: &Article) -> Self {
        let message = match article.rejection_reason.as_deref() {
            Some(reason) => format!(
                "Your article \"{}\" has been rejected. Reason: {}",
                article.title, reason
            ),
            None => format!("Your article \"{}\" has been rejected.", article.title),
        };
        Self {
            user_id: article.author_id,
            kind: NotificationKind::ArticleRejected,
            message,
            article_id: Some(article.id),
        }
    }

    pub fn role_changed(user_id: i64, role: RoleName) -> Self {
        Self {
            user_id,
            kind: NotificationKind::RoleChanged,
            message: format!("Your role has been changed to {}.", role),
            article_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_storage_names_match_serde() {
        for kind in [
            NotificationKind::ArticleApproved,
            NotificationKind::ArticleRejected,
            NotificationKind::RoleChanged,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            assert_eq!(NotificationKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(NotificationKind::from_str("comment_posted"), None);
    }
}
