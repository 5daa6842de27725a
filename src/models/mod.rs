//! Data models
//!
//! Database entities (Role, User, Session, Article, Notification,
//! PasswordResetToken) plus the input and pagination types that travel
//! between the API, services and repositories.

mod article;
mod notification;
mod pagination;
mod password_reset;
mod role;
mod session;
mod user;

pub use article::{
    Article, ArticleStatus, CreateArticleInput, StatusCounts, UpdateArticleInput, MAX_TITLE_LENGTH,
};
pub use notification::{NewNotification, Notification, NotificationKind};
pub use pagination::{ListParams, PagedResult};
pub use password_reset::PasswordResetToken;
pub use role::{Role, RoleName};
pub use session::Session;
pub use user::{NewUser, UpdateProfileInput, User, UserStatus};

#[cfg(test)]
pub(crate) use user::sample_user;
