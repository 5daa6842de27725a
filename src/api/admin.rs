//! Admin API endpoints
//!
//! Everything here sits behind `require_auth` + `require_admin`:
//! - GET /api/v1/admin/dashboard - Article and user counts
//! - GET /api/v1/admin/articles - All articles, optionally by status
//! - GET /api/v1/admin/articles/pending - Review queue, oldest first
//! - POST /api/v1/admin/articles/{id}/approve
//! - POST /api/v1/admin/articles/{id}/reject
//! - GET /api/v1/admin/users
//! - PUT /api/v1/admin/users/{id}/role
//! - PUT /api/v1/admin/users/{id}/status

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{ArticleResponse, PagedResponse, UserResponse};
use crate::models::{RoleName, StatusCounts, UserStatus};
use crate::services::RoleReport;

/// Response for dashboard stats
#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub total_articles: i64,
    pub articles: StatusCounts,
    pub total_users: i64,
    pub users_without_role: i64,
    pub users_by_role: Vec<RoleCount>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoleCount {
    pub role: String,
    pub count: i64,
}

fn role_counts(report: RoleReport) -> Vec<RoleCount> {
    report
        .by_role
        .into_iter()
        .map(|(role, count)| RoleCount {
            role: role.to_string(),
            count,
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/articles", get(list_articles))
        .route("/articles/pending", get(list_pending))
        .route("/articles/{id}/approve", post(approve_article))
        .route("/articles/{id}/reject", post(reject_article))
        .route("/users", get(list_users))
        .route("/users/{id}/role", put(set_user_role))
        .route("/users/{id}/status", put(set_user_status))
}

/// GET /api/v1/admin/dashboard
async fn get_dashboard(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<DashboardResponse>, ApiError> {
    let articles = state.article_service.status_counts().await?;
    let total_users = state.user_service.count_users().await?;
    let roles = state.maintenance.verify_role_ids().await.map_err(|e| {
        tracing::error!("Failed to count roles: {:#}", e);
        ApiError::internal_error("Internal server error")
    })?;

    Ok(Json(DashboardResponse {
        total_articles: articles.total(),
        articles,
        total_users,
        users_without_role: roles.without_role,
        users_by_role: role_counts(roles),
    }))
}

/// GET /api/v1/admin/articles?status=
async fn list_articles(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PagedResponse<ArticleResponse>>, ApiError> {
    let status = query.article_status()?;
    let page = state
        .article_service
        .list_all(status, &query.params())
        .await?;
    Ok(Json(PagedResponse::from_page(page)))
}

/// GET /api/v1/admin/articles/pending
async fn list_pending(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PagedResponse<ArticleResponse>>, ApiError> {
    let page = state.article_service.list_pending(&query.params()).await?;
    Ok(Json(PagedResponse::from_page(page)))
}

/// POST /api/v1/admin/articles/{id}/approve
async fn approve_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let article = state.article_service.approve(&user.0, id).await?;
    Ok(Json(article.into()))
}

/// POST /api/v1/admin/articles/{id}/reject
async fn reject_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<RejectRequest>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let article = state
        .article_service
        .reject(&user.0, id, body.reason)
        .await?;
    Ok(Json(article.into()))
}

/// GET /api/v1/admin/users
async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PagedResponse<UserResponse>>, ApiError> {
    let page = state.user_service.list_users(&query.params()).await?;
    Ok(Json(PagedResponse::from_page(page)))
}

/// PUT /api/v1/admin/users/{id}/role
async fn set_user_role(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<SetRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let role: RoleName = body
        .role
        .parse()
        .map_err(|_| ApiError::validation_error(format!("Unknown role: {}", body.role)))?;

    let updated = state.user_service.set_role(&user.0, id, role).await?;
    Ok(Json(updated.into()))
}

/// PUT /api/v1/admin/users/{id}/status
async fn set_user_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<SetStatusRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let status: UserStatus = body
        .status
        .parse()
        .map_err(|_| ApiError::validation_error(format!("Unknown status: {}", body.status)))?;

    let updated = state.user_service.set_status(&user.0, id, status).await?;
    Ok(Json(updated.into()))
}
