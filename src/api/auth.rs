//! Authentication API endpoints
//!
//! Handles HTTP requests for accounts and sessions:
//! - POST /api/v1/auth/register - User registration (first user becomes admin)
//! - POST /api/v1/auth/login - User login, rate limited per account
//! - POST /api/v1/auth/logout - User logout
//! - GET /api/v1/auth/me - Get current user
//! - PUT /api/v1/auth/profile - Update display name and avatar
//! - PUT /api/v1/auth/password - Change password
//! - POST /api/v1/auth/password-reset/request - Email a reset link
//! - POST /api/v1/auth/password-reset/confirm - Set a new password from a reset token

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, SessionToken};
use crate::api::responses::{AuthResponse, MessageResponse, UserResponse};
use crate::models::{Session, UpdateProfileInput};
use crate::services::user::{LoginInput, RegisterInput, UserServiceError};

/// Request body for user login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetConfirmRequest {
    pub token: String,
    pub new_password: String,
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/password-reset/request", post(request_password_reset))
        .route("/password-reset/confirm", post(confirm_password_reset))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
        .route("/profile", put(update_profile))
        .route("/password", put(change_password))
}

fn session_cookie(session: &Session, max_age_secs: i64) -> Result<HeaderMap, ApiError> {
    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session.id, max_age_secs
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie)
            .map_err(|_| ApiError::internal_error("Invalid session cookie"))?,
    );
    Ok(headers)
}

/// Failed logins are counted per account, so the username and the email of
/// one user share a budget. Unknown identifiers are keyed by their lowercased text.
async fn rate_limit_key(state: &AppState, identifier: &str) -> Result<String, ApiError> {
    let user = state
        .user_service
        .find_user_by_username_or_email(identifier)
        .await?;
    Ok(match user {
        Some(user) => format!("user:{}", user.id),
        None => format!("login:{}", identifier.to_lowercase()),
    })
}

/// POST /api/v1/auth/register - User registration
async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> Result<impl IntoResponse, ApiError> {
    let password = input.password.clone();
    let user = state.user_service.register(input).await?;

    let (session, user) = state
        .user_service
        .login(LoginInput::new(&user.username, password))
        .await?;
    let headers = session_cookie(&session, state.user_service.session_max_age_secs())?;

    Ok((
        StatusCode::CREATED,
        headers,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/login - User login
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let identifier = body.username_or_email.trim().to_string();
    let limit_key = rate_limit_key(&state, &identifier).await?;

    if state.rate_limiter.is_limited(&limit_key).await {
        tracing::warn!("Login rate limit hit for {}", identifier);
        return Err(ApiError::with_details(
            "RATE_LIMIT",
            "Too many failed login attempts, try again later",
            serde_json::json!({ "retry_after": state.config.auth.login_window_minutes * 60 }),
        ));
    }

    let (session, user) = match state
        .user_service
        .login(LoginInput::new(&identifier, body.password))
        .await
    {
        Ok(result) => result,
        Err(e) => {
            if matches!(e, UserServiceError::AuthenticationError(_)) {
                state.rate_limiter.record_failed_attempt(&limit_key).await;
            }
            return Err(e.into());
        }
    };

    state.rate_limiter.clear(&limit_key).await;
    let headers = session_cookie(&session, state.user_service.session_max_age_secs())?;

    Ok((
        headers,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/logout - User logout
async fn logout(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> Result<impl IntoResponse, ApiError> {
    state.user_service.logout(&token).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );

    Ok((StatusCode::NO_CONTENT, headers))
}

/// GET /api/v1/auth/me - Get current user
async fn get_current_user(user: AuthenticatedUser) -> Json<UserResponse> {
    Json(user.0.into())
}

/// PUT /api/v1/auth/profile - Update profile
async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpdateProfileInput>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = state.user_service.update_profile(user.0.id, body).await?;
    Ok(Json(updated.into()))
}

/// PUT /api/v1/auth/password - Change password
///
/// Other sessions of the user are signed out; the calling one survives.
async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    SessionToken(token): SessionToken,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .user_service
        .change_password(
            user.0.id,
            Some(&token),
            &body.current_password,
            &body.new_password,
        )
        .await?;

    Ok(Json(MessageResponse::new("Password changed")))
}

/// POST /api/v1/auth/password-reset/request
///
/// Answers 202 whether or not the email belongs to an account.
async fn request_password_reset(
    State(state): State<AppState>,
    Json(body): Json<ResetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .password_reset_service
        .request_reset(&body.email)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse::new(
            "If an account exists for this email, a reset link has been sent",
        )),
    ))
}

/// POST /api/v1/auth/password-reset/confirm
async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(body): Json<ResetConfirmRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .password_reset_service
        .reset_password(&body.token, &body.new_password)
        .await?;

    Ok(Json(MessageResponse::new("Password has been reset")))
}
