//! Article API endpoints
//!
//! Handles HTTP requests for article authoring:
//! - GET /api/v1/articles - List approved articles
//! - GET /api/v1/articles/{id} - Get an article (hidden ones only for owner/admin)
//! - GET /api/v1/articles/mine - List the caller's own articles
//! - POST /api/v1/articles - Create an article (pending, or draft)
//! - PUT /api/v1/articles/{id} - Update an article
//! - DELETE /api/v1/articles/{id} - Delete an article
//! - POST /api/v1/articles/{id}/submit - Send a draft or rejected article to review

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use crate::api::responses::{ArticleResponse, PagedResponse};
use crate::models::{CreateArticleInput, UpdateArticleInput};

/// Public article routes
pub fn public_router() -> Router<AppState> {
    Router::new().route("/articles", get(list_articles))
}

/// Routes that look at the caller when one is signed in
pub fn optional_auth_router() -> Router<AppState> {
    Router::new().route("/articles/{id}", get(get_article))
}

/// Routes that require a signed-in user
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/articles", post(create_article))
        .route("/articles/mine", get(list_my_articles))
        .route(
            "/articles/{id}",
            axum::routing::put(update_article).delete(delete_article),
        )
        .route("/articles/{id}/submit", post(submit_article))
}

/// GET /api/v1/articles - approved articles, newest first
async fn list_articles(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PagedResponse<ArticleResponse>>, ApiError> {
    let page = state.article_service.list_public(&query.params()).await?;
    Ok(Json(PagedResponse::from_page(page)))
}

/// GET /api/v1/articles/{id}
async fn get_article(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let article = state.article_service.get(id, viewer.as_ref()).await?;
    Ok(Json(article.into()))
}

/// GET /api/v1/articles/mine?status=
async fn list_my_articles(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PagedResponse<ArticleResponse>>, ApiError> {
    let status = query.article_status()?;
    let page = state
        .article_service
        .list_mine(user.0.id, status, &query.params())
        .await?;
    Ok(Json(PagedResponse::from_page(page)))
}

/// POST /api/v1/articles
async fn create_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateArticleInput>,
) -> Result<(StatusCode, Json<ArticleResponse>), ApiError> {
    let article = state.article_service.create(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(article.into())))
}

/// PUT /api/v1/articles/{id}
async fn update_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateArticleInput>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let article = state.article_service.update(&user.0, id, body).await?;
    Ok(Json(article.into()))
}

/// DELETE /api/v1/articles/{id}
async fn delete_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.article_service.delete(&user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/articles/{id}/submit
async fn submit_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let article = state.article_service.submit(&user.0, id).await?;
    Ok(Json(article.into()))
}
