//! Notification API endpoints
//!
//! - GET /api/v1/notifications - The caller's notifications, newest first
//! - GET /api/v1/notifications/unread-count
//! - POST /api/v1/notifications/{id}/read
//! - POST /api/v1/notifications/read-all

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::NotificationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{NotificationResponse, PagedResponse};

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkedResponse {
    pub updated: u64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/{id}/read", post(mark_read))
}

async fn list_notifications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<PagedResponse<NotificationResponse>>, ApiError> {
    let page = state
        .notification_service
        .list(user.0.id, query.unread_only, &query.params())
        .await?;
    Ok(Json(PagedResponse::from_page(page)))
}

async fn unread_count(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let unread = state.notification_service.unread_count(user.0.id).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

/// Only the owner can mark a notification; others get 404
async fn mark_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.notification_service.mark_read(user.0.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn mark_all_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<MarkedResponse>, ApiError> {
    let updated = state.notification_service.mark_all_read(user.0.id).await?;
    Ok(Json(MarkedResponse { updated }))
}
