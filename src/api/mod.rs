//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1`:
//! - Health check
//! - Auth: registration, login, sessions, profile, password reset
//! - Articles: public listing and authoring
//! - Notifications for the signed-in user
//! - Callable functions (`getUserWithRole`)
//! - Admin: moderation queue and user management

pub mod admin;
pub mod articles;
pub mod auth;
pub mod common;
pub mod functions;
pub mod health;
pub mod middleware;
pub mod notifications;
pub mod responses;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but not admin)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .merge(articles::protected_router())
        .merge(notifications::router())
        .merge(functions::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes that still want to know who is asking
    let optional_routes = articles::optional_auth_router().route_layer(
        axum_middleware::from_fn_with_state(state, middleware::optional_auth),
    );

    // Public routes
    Router::new()
        .merge(health::router())
        .nest("/auth", auth::public_router())
        .merge(articles::public_router())
        .merge(optional_routes)
        .merge(admin_routes)
        .merge(protected_routes)
}

/// Origin to echo in `Access-Control-Allow-Origin`.
///
/// Credentialed CORS cannot use a wildcard, so `*` is refused like any
/// unparsable value.
fn allowed_origin(cors_origin: &str) -> Option<HeaderValue> {
    if cors_origin.trim() == "*" {
        return None;
    }
    cors_origin.parse::<HeaderValue>().ok()
}

fn cors_layer(cors_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    match allowed_origin(cors_origin) {
        Some(origin) => cors.allow_origin(origin),
        None => {
            tracing::warn!(
                "Unusable CORS origin {:?}, cross-origin requests disabled",
                cors_origin
            );
            cors
        }
    }
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
