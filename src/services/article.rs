//! Article service
//!
//! Article CRUD and the moderation workflow. Visibility rules:
//! approved articles are public, everything else is visible only to the
//! author and to admins.

use crate::db::repositories::{ArticleQuery, ArticleRepository};
use crate::models::{
    Article, ArticleStatus, CreateArticleInput, ListParams, NewNotification, PagedResult,
    StatusCounts, UpdateArticleInput, User, MAX_TITLE_LENGTH,
};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

const MAX_IMAGE_URL_LENGTH: usize = 500;
const MAX_REJECTION_REASON_LENGTH: usize = 1000;

/// Error types for article service operations
#[derive(Debug, thiserror::Error)]
pub enum ArticleServiceError {
    /// Article not found, or not visible to the caller
    #[error("Article not found: {0}")]
    NotFound(i64),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The workflow does not allow this status change
    #[error("Cannot move article from {from} to {to}")]
    InvalidTransition {
        from: ArticleStatus,
        to: ArticleStatus,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Article service for managing articles and their review
pub struct ArticleService {
    repo: Arc<dyn ArticleRepository>,
}

impl ArticleService {
    pub fn new(repo: Arc<dyn ArticleRepository>) -> Self {
        Self { repo }
    }

    /// Create an article. It enters review as `pending` unless saved as a draft.
    pub async fn create(
        &self,
        author: &User,
        mut input: CreateArticleInput,
    ) -> Result<Article, ArticleServiceError> {
        input.title = validate_title(&input.title)?;
        validate_content(&input.content)?;
        input.image = validate_image(input.image)?;

        let status = if input.draft {
            ArticleStatus::Draft
        } else {
            ArticleStatus::Pending
        };

        let article = self
            .repo
            .create(author.id, &input, status)
            .await
            .context("Failed to create article")?;

        tracing::info!(
            "User {} created article {} ({})",
            author.id,
            article.id,
            article.status
        );
        Ok(article)
    }

    /// Fetch an article as `viewer` would see it
    pub async fn get(
        &self,
        id: i64,
        viewer: Option<&User>,
    ) -> Result<Article, ArticleServiceError> {
        let article = self.load(id).await?;
        if article.is_public() || viewer.is_some_and(|v| v.can_manage(article.author_id)) {
            Ok(article)
        } else {
            Err(ArticleServiceError::NotFound(id))
        }
    }

    /// Approved articles, newest first
    pub async fn list_public(
        &self,
        params: &ListParams,
    ) -> Result<PagedResult<Article>, ArticleServiceError> {
        self.list(&ArticleQuery::with_status(ArticleStatus::Approved), params)
            .await
    }

    /// The author's own articles, optionally filtered by status
    pub async fn list_mine(
        &self,
        author_id: i64,
        status: Option<ArticleStatus>,
        params: &ListParams,
    ) -> Result<PagedResult<Article>, ArticleServiceError> {
        self.list(&ArticleQuery::by_author(author_id, status), params)
            .await
    }

    /// Every article, optionally filtered by status (admin view)
    pub async fn list_all(
        &self,
        status: Option<ArticleStatus>,
        params: &ListParams,
    ) -> Result<PagedResult<Article>, ArticleServiceError> {
        let query = ArticleQuery {
            status,
            ..ArticleQuery::default()
        };
        self.list(&query, params).await
    }

    /// Review queue: pending articles, oldest first
    pub async fn list_pending(
        &self,
        params: &ListParams,
    ) -> Result<PagedResult<Article>, ArticleServiceError> {
        let query = ArticleQuery {
            oldest_first: true,
            ..ArticleQuery::with_status(ArticleStatus::Pending)
        };
        self.list(&query, params).await
    }

    async fn list(
        &self,
        query: &ArticleQuery,
        params: &ListParams,
    ) -> Result<PagedResult<Article>, ArticleServiceError> {
        let page = self
            .repo
            .list(query, params)
            .await
            .context("Failed to list articles")?;
        Ok(page)
    }

    /// Edit an article.
    ///
    /// An author editing an approved or rejected article sends it back to
    /// review. Admin edits leave the status alone.
    pub async fn update(
        &self,
        viewer: &User,
        id: i64,
        input: UpdateArticleInput,
    ) -> Result<Article, ArticleServiceError> {
        let mut article = self.load_managed(viewer, id).await?;
        let read_status = article.status;

        if input.is_empty() {
            return Err(ArticleServiceError::ValidationError(
                "No fields to update".to_string(),
            ));
        }

        if let Some(title) = input.title {
            article.title = validate_title(&title)?;
        }
        if let Some(content) = input.content {
            validate_content(&content)?;
            article.content = content;
        }
        if let Some(image) = input.image {
            article.image = validate_image(image)?;
        }

        if !viewer.is_admin()
            && matches!(
                article.status,
                ArticleStatus::Approved | ArticleStatus::Rejected
            )
        {
            tracing::info!(
                "Article {} edited by its author, returning to review",
                article.id
            );
            article.status = ArticleStatus::Pending;
            article.is_approved = false;
        }

        self.save(&article, read_status, None, "Failed to update article")
            .await
    }

    /// Submit a draft or rejected article for review
    pub async fn submit(&self, viewer: &User, id: i64) -> Result<Article, ArticleServiceError> {
        let mut article = self.load_managed(viewer, id).await?;
        let read_status = article.status;

        if !matches!(read_status, ArticleStatus::Draft | ArticleStatus::Rejected) {
            return Err(ArticleServiceError::InvalidTransition {
                from: article.status,
                to: ArticleStatus::Pending,
            });
        }

        article.status = ArticleStatus::Pending;
        article.is_approved = false;

        let updated = self
            .save(&article, read_status, None, "Failed to submit article")
            .await?;
        tracing::info!("Article {} submitted for review", id);
        Ok(updated)
    }

    /// Delete an article (author or admin)
    pub async fn delete(&self, viewer: &User, id: i64) -> Result<(), ArticleServiceError> {
        self.load_managed(viewer, id).await?;
        self.repo
            .delete(id)
            .await
            .context("Failed to delete article")?;
        tracing::info!("User {} deleted article {}", viewer.id, id);
        Ok(())
    }

    /// Approve a pending or rejected article and notify its author
    pub async fn approve(&self, admin: &User, id: i64) -> Result<Article, ArticleServiceError> {
        let article = self
            .review(admin, id, ArticleStatus::Approved, None)
            .await?;

        tracing::info!("Admin {} approved article {}", admin.id, id);
        Ok(article)
    }

    /// Reject a pending or approved article and notify its author
    pub async fn reject(
        &self,
        admin: &User,
        id: i64,
        reason: Option<String>,
    ) -> Result<Article, ArticleServiceError> {
        let reason = match reason.map(|r| r.trim().to_string()) {
            Some(r) if r.is_empty() => None,
            Some(r) if r.chars().count() > MAX_REJECTION_REASON_LENGTH => {
                return Err(ArticleServiceError::ValidationError(format!(
                    "Rejection reason must be at most {} characters",
                    MAX_REJECTION_REASON_LENGTH
                )))
            }
            other => other,
        };

        let article = self
            .review(admin, id, ArticleStatus::Rejected, reason)
            .await?;

        tracing::info!("Admin {} rejected article {}", admin.id, id);
        Ok(article)
    }

    // The status change and the author's notification commit together.
    async fn review(
        &self,
        admin: &User,
        id: i64,
        to: ArticleStatus,
        reason: Option<String>,
    ) -> Result<Article, ArticleServiceError> {
        if !admin.is_admin() {
            return Err(ArticleServiceError::Forbidden(
                "Admin access required".to_string(),
            ));
        }

        let mut article = self.load(id).await?;
        let read_status = article.status;
        if !read_status.can_transition_to(to) {
            return Err(ArticleServiceError::InvalidTransition {
                from: read_status,
                to,
            });
        }

        article.status = to;
        article.is_approved = to == ArticleStatus::Approved;
        article.rejection_reason = reason;
        article.reviewed_by = Some(admin.id);
        article.reviewed_at = Some(Utc::now());

        let notification = if to == ArticleStatus::Approved {
            NewNotification::article_approved(&article)
        } else {
            NewNotification::article_rejected(&article)
        };

        self.save(&article, read_status, Some(&notification), "Failed to save review")
            .await
    }

    /// Write `article` unless its stored status moved away from `read_status`
    async fn save(
        &self,
        article: &Article,
        read_status: ArticleStatus,
        notification: Option<&NewNotification>,
        failure: &'static str,
    ) -> Result<Article, ArticleServiceError> {
        let saved = self
            .repo
            .update(article, read_status, notification)
            .await
            .context(failure)?;

        match saved {
            Some(saved) => Ok(saved),
            None => {
                let current = self.load(article.id).await?;
                tracing::warn!(
                    "Article {} changed to {} concurrently, dropping write",
                    article.id,
                    current.status
                );
                Err(ArticleServiceError::InvalidTransition {
                    from: current.status,
                    to: article.status,
                })
            }
        }
    }

    /// Article counts per status
    pub async fn status_counts(&self) -> Result<StatusCounts, ArticleServiceError> {
        let counts = self
            .repo
            .count_by_status()
            .await
            .context("Failed to count articles")?;
        Ok(counts)
    }

    async fn load(&self, id: i64) -> Result<Article, ArticleServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get article")?
            .ok_or(ArticleServiceError::NotFound(id))
    }

    // Hidden articles of other users look missing rather than forbidden.
    async fn load_managed(&self, viewer: &User, id: i64) -> Result<Article, ArticleServiceError> {
        let article = self.load(id).await?;
        if viewer.can_manage(article.author_id) {
            Ok(article)
        } else if article.is_public() {
            Err(ArticleServiceError::Forbidden(
                "You can only modify your own articles".to_string(),
            ))
        } else {
            Err(ArticleServiceError::NotFound(id))
        }
    }
}

fn validate_title(title: &str) -> Result<String, ArticleServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ArticleServiceError::ValidationError(
            "Title is required".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ArticleServiceError::ValidationError(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(title.to_string())
}

fn validate_content(content: &str) -> Result<(), ArticleServiceError> {
    if content.trim().is_empty() {
        return Err(ArticleServiceError::ValidationError(
            "Content is required".to_string(),
        ));
    }
    Ok(())
}

fn validate_image(image: Option<String>) -> Result<Option<String>, ArticleServiceError> {
    match image.map(|i| i.trim().to_string()) {
        Some(i) if i.is_empty() => Ok(None),
        Some(i) if i.len() > MAX_IMAGE_URL_LENGTH => Err(ArticleServiceError::ValidationError(
            format!("Image URL must be at most {} characters", MAX_IMAGE_URL_LENGTH),
        )),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::setup_pool;
    use crate::db::repositories::{
        NotificationRepository, SqlxArticleRepository, SqlxNotificationRepository,
        SqlxUserRepository, UserRepository,
    };
    use crate::db::DynDatabasePool;
    use crate::models::{NewUser, NotificationKind, RoleName};

    struct Fixture {
        pool: DynDatabasePool,
        service: ArticleService,
        admin: User,
        alice: User,
        bob: User,
    }

    async fn create_user(pool: &DynDatabasePool, name: &str, role: RoleName) -> User {
        SqlxUserRepository::new(pool.clone())
            .create(&NewUser {
                username: name.to_string(),
                email: format!("{}@example.com", name),
                password_hash: "hash".to_string(),
                full_name: None,
                role,
            })
            .await
            .expect("Failed to create user")
    }

    async fn fixture() -> Fixture {
        let pool = setup_pool().await;
        let service = ArticleService::new(SqlxArticleRepository::boxed(pool.clone()));
        Fixture {
            admin: create_user(&pool, "admin", RoleName::Admin).await,
            alice: create_user(&pool, "alice", RoleName::User).await,
            bob: create_user(&pool, "bob", RoleName::User).await,
            pool,
            service,
        }
    }

    async fn notifications_for(pool: &DynDatabasePool, user_id: i64) -> Vec<NotificationKind> {
        SqlxNotificationRepository::new(pool.clone())
            .list_for_user(user_id, false, &ListParams::default())
            .await
            .unwrap()
            .items
            .into_iter()
            .map(|n| n.kind)
            .collect()
    }

    #[tokio::test]
    async fn test_create_defaults_to_pending() {
        let f = fixture().await;
        let article = f
            .service
            .create(&f.alice, CreateArticleInput::new("  Hello  ", "World"))
            .await
            .unwrap();
        assert_eq!(article.status, ArticleStatus::Pending);
        assert_eq!(article.title, "Hello");
        assert!(!article.is_approved);

        let draft = f
            .service
            .create(&f.alice, CreateArticleInput::new("Later", "Body").as_draft())
            .await
            .unwrap();
        assert_eq!(draft.status, ArticleStatus::Draft);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let f = fixture().await;
        for input in [
            CreateArticleInput::new("   ", "Body"),
            CreateArticleInput::new("Title", "  "),
            CreateArticleInput::new("x".repeat(MAX_TITLE_LENGTH + 1), "Body"),
        ] {
            assert!(matches!(
                f.service.create(&f.alice, input).await,
                Err(ArticleServiceError::ValidationError(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_visibility() {
        let f = fixture().await;
        let article = f
            .service
            .create(&f.alice, CreateArticleInput::new("T", "C"))
            .await
            .unwrap();

        assert!(f.service.get(article.id, Some(&f.alice)).await.is_ok());
        assert!(f.service.get(article.id, Some(&f.admin)).await.is_ok());
        assert!(matches!(
            f.service.get(article.id, Some(&f.bob)).await,
            Err(ArticleServiceError::NotFound(_))
        ));
        assert!(matches!(
            f.service.get(article.id, None).await,
            Err(ArticleServiceError::NotFound(_))
        ));
        assert_eq!(f.service.list_public(&ListParams::default()).await.unwrap().total, 0);

        f.service.approve(&f.admin, article.id).await.unwrap();
        assert!(f.service.get(article.id, None).await.is_ok());
        assert_eq!(f.service.list_public(&ListParams::default()).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_approve_sets_review_fields_and_notifies() {
        let f = fixture().await;
        let article = f
            .service
            .create(&f.alice, CreateArticleInput::new("T", "C"))
            .await
            .unwrap();

        let approved = f.service.approve(&f.admin, article.id).await.unwrap();
        assert_eq!(approved.status, ArticleStatus::Approved);
        assert!(approved.is_approved);
        assert_eq!(approved.reviewed_by, Some(f.admin.id));
        assert!(approved.reviewed_at.is_some());

        assert_eq!(
            notifications_for(&f.pool, f.alice.id).await,
            vec![NotificationKind::ArticleApproved]
        );
    }

    #[tokio::test]
    async fn test_reject_stores_reason_and_notifies() {
        let f = fixture().await;
        let article = f
            .service
            .create(&f.alice, CreateArticleInput::new("T", "C"))
            .await
            .unwrap();

        let rejected = f
            .service
            .reject(&f.admin, article.id, Some(" Too short ".to_string()))
            .await
            .unwrap();
        assert_eq!(rejected.status, ArticleStatus::Rejected);
        assert!(!rejected.is_approved);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Too short"));

        assert_eq!(
            notifications_for(&f.pool, f.alice.id).await,
            vec![NotificationKind::ArticleRejected]
        );

        let approved = f.service.approve(&f.admin, article.id).await.unwrap();
        assert!(approved.rejection_reason.is_none());
    }

    #[tokio::test]
    async fn test_failed_notification_leaves_article_reviewable() {
        let f = fixture().await;
        let article = f
            .service
            .create(&f.alice, CreateArticleInput::new("T", "C"))
            .await
            .unwrap();
        let sqlite = f.pool.as_sqlite().unwrap();

        sqlx::query(
            "CREATE TRIGGER reject_notifications BEFORE INSERT ON notifications \
             BEGIN SELECT RAISE(ABORT, 'notifications unavailable'); END",
        )
        .execute(sqlite)
        .await
        .unwrap();

        assert!(matches!(
            f.service
                .reject(&f.admin, article.id, Some("Off topic".to_string()))
                .await,
            Err(ArticleServiceError::InternalError(_))
        ));
        let stored = f.service.get(article.id, Some(&f.admin)).await.unwrap();
        assert_eq!(stored.status, ArticleStatus::Pending);
        assert!(stored.rejection_reason.is_none());
        assert!(stored.reviewed_by.is_none());

        sqlx::query("DROP TRIGGER reject_notifications")
            .execute(sqlite)
            .await
            .unwrap();

        let rejected = f
            .service
            .reject(&f.admin, article.id, Some("Off topic".to_string()))
            .await
            .unwrap();
        assert_eq!(rejected.status, ArticleStatus::Rejected);
        assert_eq!(
            notifications_for(&f.pool, f.alice.id).await,
            vec![NotificationKind::ArticleRejected]
        );
    }

    #[tokio::test]
    async fn test_concurrent_approvals_apply_once() {
        let f = fixture().await;
        let article = f
            .service
            .create(&f.alice, CreateArticleInput::new("T", "C"))
            .await
            .unwrap();
        let second_admin = create_user(&f.pool, "second", RoleName::Admin).await;

        let (a, b) = tokio::join!(
            f.service.approve(&f.admin, article.id),
            f.service.approve(&second_admin, article.id)
        );

        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes.iter().any(|r| matches!(
            r,
            Err(ArticleServiceError::InvalidTransition {
                from: ArticleStatus::Approved,
                to: ArticleStatus::Approved,
            })
        )));
        assert_eq!(
            notifications_for(&f.pool, f.alice.id).await,
            vec![NotificationKind::ArticleApproved]
        );
    }

    #[tokio::test]
    async fn test_invalid_transitions() {
        let f = fixture().await;
        let draft = f
            .service
            .create(&f.alice, CreateArticleInput::new("T", "C").as_draft())
            .await
            .unwrap();

        assert!(matches!(
            f.service.approve(&f.admin, draft.id).await,
            Err(ArticleServiceError::InvalidTransition { .. })
        ));
        assert!(matches!(
            f.service.reject(&f.admin, draft.id, None).await,
            Err(ArticleServiceError::InvalidTransition { .. })
        ));

        f.service.submit(&f.alice, draft.id).await.unwrap();
        assert!(matches!(
            f.service.submit(&f.alice, draft.id).await,
            Err(ArticleServiceError::InvalidTransition { .. })
        ));

        f.service.approve(&f.admin, draft.id).await.unwrap();
        assert!(matches!(
            f.service.approve(&f.admin, draft.id).await,
            Err(ArticleServiceError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_non_admin_cannot_review() {
        let f = fixture().await;
        let article = f
            .service
            .create(&f.alice, CreateArticleInput::new("T", "C"))
            .await
            .unwrap();

        assert!(matches!(
            f.service.approve(&f.alice, article.id).await,
            Err(ArticleServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_author_edit_of_approved_returns_to_review() {
        let f = fixture().await;
        let article = f
            .service
            .create(&f.alice, CreateArticleInput::new("T", "C"))
            .await
            .unwrap();
        f.service.approve(&f.admin, article.id).await.unwrap();

        let admin_edit = f
            .service
            .update(
                &f.admin,
                article.id,
                UpdateArticleInput {
                    title: Some("Typo fixed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(admin_edit.status, ArticleStatus::Approved);

        let author_edit = f
            .service
            .update(
                &f.alice,
                article.id,
                UpdateArticleInput {
                    content: Some("Rewritten".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(author_edit.status, ArticleStatus::Pending);
        assert!(!author_edit.is_approved);
        assert_eq!(author_edit.title, "Typo fixed");
    }

    #[tokio::test]
    async fn test_other_users_cannot_modify() {
        let f = fixture().await;
        let article = f
            .service
            .create(&f.alice, CreateArticleInput::new("T", "C"))
            .await
            .unwrap();

        assert!(matches!(
            f.service.delete(&f.bob, article.id).await,
            Err(ArticleServiceError::NotFound(_))
        ));

        f.service.approve(&f.admin, article.id).await.unwrap();
        assert!(matches!(
            f.service
                .update(
                    &f.bob,
                    article.id,
                    UpdateArticleInput {
                        title: Some("mine now".to_string()),
                        ..Default::default()
                    }
                )
                .await,
            Err(ArticleServiceError::Forbidden(_))
        ));

        f.service.delete(&f.admin, article.id).await.unwrap();
        assert!(matches!(
            f.service.get(article.id, Some(&f.admin)).await,
            Err(ArticleServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_pending_queue_is_oldest_first() {
        let f = fixture().await;
        let first = f
            .service
            .create(&f.alice, CreateArticleInput::new("first", "C"))
            .await
            .unwrap();
        f.service
            .create(&f.bob, CreateArticleInput::new("second", "C"))
            .await
            .unwrap();

        let queue = f.service.list_pending(&ListParams::default()).await.unwrap();
        assert_eq!(queue.total, 2);
        assert_eq!(queue.items[0].id, first.id);

        let counts = f.service.status_counts().await.unwrap();
        assert_eq!(counts.pending, 2);

        let mine = f
            .service
            .list_mine(f.bob.id, Some(ArticleStatus::Pending), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(mine.total, 1);
    }
}
