//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for a single table.

pub mod article;
pub mod notification;
pub mod password_reset;
pub mod role;
pub mod session;
pub mod user;

pub use article::{ArticleQuery, ArticleRepository, SqlxArticleRepository};
pub use notification::{NotificationRepository, SqlxNotificationRepository};
pub use password_reset::{PasswordResetRepository, SqlxPasswordResetRepository};
pub use role::{RoleRepository, SqlxRoleRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
