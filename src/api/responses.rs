//! Response bodies shared by the API endpoints

use serde::{Deserialize, Serialize};

use crate::models::{Article, Notification, PagedResult, Role, User};

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub profile_picture: Option<String>,
    pub role_id: Option<i64>,
    pub role: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            role: user.effective_role().to_string(),
            id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            profile_picture: user.profile_picture,
            role_id: user.role_id,
            status: user.status.to_string(),
            created_at: user.created_at.to_rfc3339(),
            updated_at: user.updated_at.to_rfc3339(),
        }
    }
}

/// Response for successful authentication
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoleInfo {
    pub id: i64,
    pub name: String,
}

impl From<Role> for RoleInfo {
    fn from(role: Role) -> Self {
        Self {
            id: role.id,
            name: role.name.to_string(),
        }
    }
}

/// A user joined with their role row
#[derive(Debug, Serialize, Deserialize)]
pub struct UserWithRoleResponse {
    pub user: UserResponse,
    pub role: Option<RoleInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ArticleResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub status: String,
    pub is_approved: bool,
    pub author_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Article> for ArticleResponse {
    fn from(article: Article) -> Self {
        Self {
            id: article.id,
            title: article.title,
            content: article.content,
            image: article.image,
            status: article.status.to_string(),
            is_approved: article.is_approved,
            author_id: article.author_id,
            rejection_reason: article.rejection_reason,
            reviewed_by: article.reviewed_by,
            reviewed_at: article.reviewed_at.map(|dt| dt.to_rfc3339()),
            created_at: article.created_at.to_rfc3339(),
            updated_at: article.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub id: i64,
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_id: Option<i64>,
    pub is_read: bool,
    pub created_at: String,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            kind: n.kind.to_string(),
            message: n.message,
            article_id: n.article_id,
            is_read: n.is_read,
            created_at: n.created_at.to_rfc3339(),
        }
    }
}

/// One page of a listing
#[derive(Debug, Serialize, Deserialize)]
pub struct PagedResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> PagedResponse<T> {
    pub fn from_page<U>(page: PagedResult<U>) -> Self
    where
        T: From<U>,
    {
        let total_pages = page.total_pages();
        let page = page.map(T::from);
        Self {
            items: page.items,
            total: page.total,
            page: page.page,
            per_page: page.per_page,
            total_pages,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
