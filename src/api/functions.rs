//! Callable functions
//!
//! `POST /api/v1/functions/getUserWithRole` resolves a user together with
//! their role row. Without `userId` the caller is resolved; looking up
//! anyone else requires the admin role.

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::UserWithRoleResponse;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUserWithRoleRequest {
    #[serde(default)]
    pub user_id: Option<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/functions/getUserWithRole", post(get_user_with_role))
}

async fn get_user_with_role(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Json(body): Json<GetUserWithRoleRequest>,
) -> Result<Json<UserWithRoleResponse>, ApiError> {
    let (user, role) = state
        .user_service
        .get_user_with_role(&caller.0, body.user_id)
        .await?;

    Ok(Json(UserWithRoleResponse {
        user: user.into(),
        role: role.map(Into::into),
    }))
}
