//! Article model
//!
//! This module provides:
//! - `Article` entity representing a blog article
//! - `ArticleStatus` enum for the moderation workflow
//! - Input types for creating and updating articles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum title length in characters
pub const MAX_TITLE_LENGTH: usize = 255;

/// Article entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    /// Unique identifier
    pub id: i64,
    /// Article title
    pub title: String,
    /// Article body
    pub content: String,
    /// Cover image URL
    pub image: Option<String>,
    /// Moderation status
    pub status: ArticleStatus,
    /// Mirrors `status == Approved`
    pub is_approved: bool,
    /// Author user ID
    pub author_id: i64,
    /// Reason given by the moderator on rejection
    pub rejection_reason: Option<String>,
    /// Admin who last approved or rejected the article
    pub reviewed_by: Option<i64>,
    /// When the article was last reviewed
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// Approved articles are readable by anyone
    pub fn is_public(&self) -> bool {
        self.status == ArticleStatus::Approved
    }
}

/// Moderation status of an article.
///
/// ```text
/// draft ──submit──▶ pending ──approve──▶ approved
///                     │  ▲                 │
///                  reject └──author edit───┤
///                     ▼                    │
///                  rejected ◀───reject─────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    /// Saved by the author, not yet submitted
    Draft,
    /// Waiting for an admin
    Pending,
    /// Visible to the public
    Approved,
    /// Sent back by an admin
    Rejected,
}

impl Default for ArticleStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl ArticleStatus {
    pub const ALL: [ArticleStatus; 4] = [
        ArticleStatus::Draft,
        ArticleStatus::Pending,
        ArticleStatus::Approved,
        ArticleStatus::Rejected,
    ];

    /// Convert status to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Pending => "pending",
            ArticleStatus::Approved => "approved",
            ArticleStatus::Rejected => "rejected",
        }
    }

    /// Parse status from database string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Some(ArticleStatus::Draft),
            "pending" => Some(ArticleStatus::Pending),
            "approved" => Some(ArticleStatus::Approved),
            "rejected" => Some(ArticleStatus::Rejected),
            _ => None,
        }
    }

    /// Whether the workflow allows moving from `self` to `to`.
    pub fn can_transition_to(&self, to: ArticleStatus) -> bool {
        use ArticleStatus::*;
        matches!(
            (self, to),
            (Draft, Pending)
                | (Rejected, Pending)
                | (Approved, Pending)
                | (Pending, Approved)
                | (Rejected, Approved)
                | (Pending, Rejected)
                | (Approved, Rejected)
        )
    }
}

impl std::fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input for creating a new article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateArticleInput {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image: Option<String>,
    /// Save as draft instead of submitting for review
    #[serde(default)]
    pub draft: bool,
}

impl CreateArticleInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            image: None,
            draft: false,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn as_draft(mut self) -> Self {
        self.draft = true;
        self
    }
}

/// Input for updating an existing article
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateArticleInput {
    pub title: Option<String>,
    pub content: Option<String>,
    /// `Some(None)` clears the image
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub image: Option<Option<String>>,
}

impl UpdateArticleInput {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.image.is_none()
    }
}

// Distinguishes an absent field from an explicit null.
fn deserialize_double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Article counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub draft: i64,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
}

impl StatusCounts {
    pub fn total(&self) -> i64 {
        self.draft + self.pending + self.approved + self.rejected
    }

    pub fn add(&mut self, status: ArticleStatus, count: i64) {
        match status {
            ArticleStatus::Draft => self.draft += count,
            ArticleStatus::Pending => self.pending += count,
            ArticleStatus::Approved => self.approved += count,
            ArticleStatus::Rejected => self.rejected += count,
        }
    }
}
