//! Services layer - Business logic
//!
//! Services implement the business rules on top of the repositories:
//! validation, permissions, the article workflow and notifications.

pub mod article;
pub mod email;
pub mod maintenance;
pub mod notification;
pub mod password;
pub mod password_reset;
pub mod rate_limiter;
pub mod user;
pub mod validation;

pub use article::{ArticleService, ArticleServiceError};
pub use email::EmailService;
pub use maintenance::{CleanupReport, MaintenanceService, RoleReport};
pub use notification::{NotificationService, NotificationServiceError};
pub use password::{hash_password, verify_password};
pub use password_reset::{PasswordResetError, PasswordResetService};
pub use rate_limiter::LoginRateLimiter;
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
