//! HTTP-level tests for the moderation workflow, roles and account flows.

use axum::http::{header, HeaderValue, StatusCode};
use axum_test::{TestRequest, TestServer};
use serde_json::{json, Value};

use quillboard::{
    api::{build_router, AppState},
    config::Config,
    db::{create_test_pool, migrations::run_migrations},
};

const PASSWORD: &str = "password123";

async fn setup() -> (TestServer, AppState) {
    let pool = create_test_pool().await.expect("Failed to create pool");
    run_migrations(&pool).await.expect("Failed to run migrations");
    let state = AppState::new(pool, &Config::default());
    let server = TestServer::new(build_router(state.clone())).expect("Failed to start server");
    (server, state)
}

fn authed(request: TestRequest, token: &str) -> TestRequest {
    let value = HeaderValue::from_str(&format!("Bearer {}", token)).unwrap();
    request.add_header(header::AUTHORIZATION, value)
}

/// Register `username` and return (token, user id)
async fn register(server: &TestServer, username: &str) -> (String, i64) {
    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": PASSWORD,
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let body: Value = response.json();
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_i64().unwrap(),
    )
}

async fn create_article(server: &TestServer, token: &str, title: &str) -> Value {
    let response = authed(server.post("/api/v1/articles"), token)
        .json(&json!({ "title": title, "content": "Body text" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json()
}

#[tokio::test]
async fn health_reports_ok() {
    let (server, _) = setup().await;

    let response = server.get("/api/v1/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn first_user_becomes_admin() {
    let (server, _) = setup().await;
    let (admin_token, _) = register(&server, "admin").await;
    let (user_token, _) = register(&server, "alice").await;

    let me: Value = authed(server.get("/api/v1/auth/me"), &admin_token).await.json();
    assert_eq!(me["role"], "admin");
    assert!(me.get("password_hash").is_none());

    let me: Value = authed(server.get("/api/v1/auth/me"), &user_token).await.json();
    assert_eq!(me["role"], "user");
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let (server, _) = setup().await;
    register(&server, "alice").await;

    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({
            "username": "alice",
            "email": "other@example.com",
            "password": PASSWORD,
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn protected_routes_require_auth() {
    let (server, _) = setup().await;

    let response = server.get("/api/v1/auth/me").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = authed(server.get("/api/v1/auth/me"), "not-a-session").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = server.get("/api/v1/admin/dashboard").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_cookie_is_accepted() {
    let (server, _) = setup().await;
    let (token, _) = register(&server, "admin").await;

    let response = server
        .get("/api/v1/auth/me")
        .add_header(
            header::COOKIE,
            HeaderValue::from_str(&format!("session={}", token)).unwrap(),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn new_article_waits_for_review() {
    let (server, _) = setup().await;
    register(&server, "admin").await;
    let (token, author_id) = register(&server, "alice").await;

    let article = create_article(&server, &token, "First post").await;
    assert_eq!(article["status"], "pending");
    assert_eq!(article["is_approved"], false);
    assert_eq!(article["author_id"], author_id);
    let id = article["id"].as_i64().unwrap();

    // Hidden from the public listing and from anonymous readers
    let public: Value = server.get("/api/v1/articles").await.json();
    assert_eq!(public["total"], 0);
    let response = server.get(&format!("/api/v1/articles/{}", id)).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    // The author still sees it
    let response = authed(server.get(&format!("/api/v1/articles/{}", id)), &token).await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let mine: Value = authed(server.get("/api/v1/articles/mine?status=pending"), &token)
        .await
        .json();
    assert_eq!(mine["total"], 1);
}

#[tokio::test]
async fn admin_approval_publishes_and_notifies() {
    let (server, _) = setup().await;
    let (admin_token, _) = register(&server, "admin").await;
    let (token, _) = register(&server, "alice").await;
    let id = create_article(&server, &token, "Hello")
        .await["id"]
        .as_i64()
        .unwrap();

    let pending: Value = authed(server.get("/api/v1/admin/articles/pending"), &admin_token)
        .await
        .json();
    assert_eq!(pending["total"], 1);

    let response = authed(
        server.post(&format!("/api/v1/admin/articles/{}/approve", id)),
        &admin_token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let article: Value = response.json();
    assert_eq!(article["status"], "approved");
    assert_eq!(article["is_approved"], true);

    let public: Value = server.get("/api/v1/articles").await.json();
    assert_eq!(public["total"], 1);
    assert_eq!(public["items"][0]["id"], id);

    let count: Value = authed(server.get("/api/v1/notifications/unread-count"), &token)
        .await
        .json();
    assert_eq!(count["unread"], 1);

    let notifications: Value = authed(server.get("/api/v1/notifications"), &token)
        .await
        .json();
    assert_eq!(notifications["items"][0]["kind"], "article_approved");
    assert_eq!(notifications["items"][0]["article_id"], id);

    // Approving twice is not a valid transition
    let response = authed(
        server.post(&format!("/api/v1/admin/articles/{}/approve", id)),
        &admin_token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn rejection_carries_reason_and_edit_resubmits() {
    let (server, _) = setup().await;
    let (admin_token, _) = register(&server, "admin").await;
    let (token, _) = register(&server, "alice").await;
    let id = create_article(&server, &token, "Rough draft")
        .await["id"]
        .as_i64()
        .unwrap();

    let response = authed(
        server.post(&format!("/api/v1/admin/articles/{}/reject", id)),
        &admin_token,
    )
    .json(&json!({ "reason": "Needs sources" }))
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let article: Value = response.json();
    assert_eq!(article["status"], "rejected");
    assert_eq!(article["rejection_reason"], "Needs sources");

    let notifications: Value = authed(server.get("/api/v1/notifications"), &token)
        .await
        .json();
    assert_eq!(notifications["items"][0]["kind"], "article_rejected");

    let response = authed(server.put(&format!("/api/v1/articles/{}", id)), &token)
        .json(&json!({ "content": "Now with sources" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let article: Value = response.json();
    assert_eq!(article["status"], "pending");
}

#[tokio::test]
async fn drafts_are_submitted_explicitly() {
    let (server, _) = setup().await;
    register(&server, "admin").await;
    let (token, _) = register(&server, "alice").await;

    let response = authed(server.post("/api/v1/articles"), &token)
        .json(&json!({ "title": "Later", "content": "WIP", "draft": true }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let article: Value = response.json();
    assert_eq!(article["status"], "draft");
    let id = article["id"].as_i64().unwrap();

    let response = authed(server.post(&format!("/api/v1/articles/{}/submit", id)), &token).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let article: Value = response.json();
    assert_eq!(article["status"], "pending");

    // Already pending
    let response = authed(server.post(&format!("/api/v1/articles/{}/submit", id)), &token).await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn users_cannot_touch_other_articles() {
    let (server, _) = setup().await;
    let (admin_token, _) = register(&server, "admin").await;
    let (alice, _) = register(&server, "alice").await;
    let (bob, _) = register(&server, "bob").await;
    let id = create_article(&server, &alice, "Mine")
        .await["id"]
        .as_i64()
        .unwrap();

    // Pending articles are invisible to other users
    let response = authed(server.delete(&format!("/api/v1/articles/{}", id)), &bob).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    authed(
        server.post(&format!("/api/v1/admin/articles/{}/approve", id)),
        &admin_token,
    )
    .await;

    // Once public they are visible but still not editable
    let response = authed(server.put(&format!("/api/v1/articles/{}", id)), &bob)
        .json(&json!({ "title": "Hijacked" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = authed(server.delete(&format!("/api/v1/articles/{}", id)), &alice).await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn admin_routes_reject_regular_users() {
    let (server, _) = setup().await;
    register(&server, "admin").await;
    let (token, _) = register(&server, "alice").await;

    for path in [
        "/api/v1/admin/dashboard",
        "/api/v1/admin/articles",
        "/api/v1/admin/users",
    ] {
        let response = authed(server.get(path), &token).await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN, "{}", path);
    }
}

#[tokio::test]
async fn dashboard_counts_articles_and_users() {
    let (server, _) = setup().await;
    let (admin_token, _) = register(&server, "admin").await;
    let (token, _) = register(&server, "alice").await;
    create_article(&server, &token, "One").await;
    create_article(&server, &token, "Two").await;

    let response = authed(server.get("/api/v1/admin/dashboard"), &admin_token).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["total_articles"], 2);
    assert_eq!(body["articles"]["pending"], 2);
    assert_eq!(body["total_users"], 2);
    assert_eq!(body["users_without_role"], 0);
}

#[tokio::test]
async fn role_change_grants_admin_and_notifies() {
    let (server, _) = setup().await;
    let (admin_token, _) = register(&server, "admin").await;
    let (token, user_id) = register(&server, "alice").await;

    let response = authed(
        server.put(&format!("/api/v1/admin/users/{}/role", user_id)),
        &admin_token,
    )
    .json(&json!({ "role": "admin" }))
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let user: Value = response.json();
    assert_eq!(user["role"], "admin");

    let notifications: Value = authed(server.get("/api/v1/notifications"), &token)
        .await
        .json();
    assert_eq!(notifications["items"][0]["kind"], "role_changed");

    let response = authed(server.get("/api/v1/admin/dashboard"), &token).await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = authed(
        server.put(&format!("/api/v1/admin/users/{}/role", user_id)),
        &admin_token,
    )
    .json(&json!({ "role": "superuser" }))
    .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_user_with_role_resolves_role_row() {
    let (server, _) = setup().await;
    let (admin_token, admin_id) = register(&server, "admin").await;
    let (token, user_id) = register(&server, "alice").await;

    let response = authed(server.post("/api/v1/functions/getUserWithRole"), &token)
        .json(&json!({}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["user"]["id"], user_id);
    assert_eq!(body["role"]["name"], "user");
    assert!(body["role"]["id"].is_i64());

    // Regular users cannot look up others
    let response = authed(server.post("/api/v1/functions/getUserWithRole"), &token)
        .json(&json!({ "userId": admin_id }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = authed(server.post("/api/v1/functions/getUserWithRole"), &admin_token)
        .json(&json!({ "userId": user_id }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["user"]["username"], "alice");

    let response = authed(server.post("/api/v1/functions/getUserWithRole"), &admin_token)
        .json(&json!({ "userId": 9999 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn notifications_can_be_marked_read() {
    let (server, _) = setup().await;
    let (admin_token, _) = register(&server, "admin").await;
    let (token, _) = register(&server, "alice").await;
    let (bob, _) = register(&server, "bob").await;

    for title in ["One", "Two"] {
        let id = create_article(&server, &token, title).await["id"]
            .as_i64()
            .unwrap();
        authed(
            server.post(&format!("/api/v1/admin/articles/{}/approve", id)),
            &admin_token,
        )
        .await;
    }

    let list: Value = authed(server.get("/api/v1/notifications"), &token)
        .await
        .json();
    let first = list["items"][0]["id"].as_i64().unwrap();

    // Someone else's notification looks missing
    let response = authed(
        server.post(&format!("/api/v1/notifications/{}/read", first)),
        &bob,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = authed(
        server.post(&format!("/api/v1/notifications/{}/read", first)),
        &token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let unread: Value = authed(server.get("/api/v1/notifications?unread_only=true"), &token)
        .await
        .json();
    assert_eq!(unread["total"], 1);

    let response = authed(server.post("/api/v1/notifications/read-all"), &token).await;
    let body: Value = response.json();
    assert_eq!(body["updated"], 1);

    let count: Value = authed(server.get("/api/v1/notifications/unread-count"), &token)
        .await
        .json();
    assert_eq!(count["unread"], 0);
}

#[tokio::test]
async fn password_reset_flow() {
    let (server, state) = setup().await;
    register(&server, "admin").await;
    let (old_token, _) = register(&server, "alice").await;

    // Unknown addresses get the same answer
    let response = server
        .post("/api/v1/auth/password-reset/request")
        .json(&json!({ "email": "nobody@example.com" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::ACCEPTED);

    let response = server
        .post("/api/v1/auth/password-reset/request")
        .json(&json!({ "email": "alice@example.com" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::ACCEPTED);

    // Mail is disabled in tests, so issue a token directly
    let reset_token = state
        .password_reset_service
        .request_reset("alice@example.com")
        .await
        .unwrap()
        .expect("token for a known account");

    let response = server
        .post("/api/v1/auth/password-reset/confirm")
        .json(&json!({ "token": reset_token, "new_password": "newpassword456" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    // Tokens are single use
    let response = server
        .post("/api/v1/auth/password-reset/confirm")
        .json(&json!({ "token": reset_token, "new_password": "another789pass" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    // Existing sessions were revoked
    let response = authed(server.get("/api/v1/auth/me"), &old_token).await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({ "username_or_email": "alice", "password": PASSWORD }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({ "username_or_email": "alice@example.com", "password": "newpassword456" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn change_password_keeps_current_session() {
    let (server, _) = setup().await;
    let (first, _) = register(&server, "alice").await;
    let second: Value = server
        .post("/api/v1/auth/login")
        .json(&json!({ "username_or_email": "alice", "password": PASSWORD }))
        .await
        .json();
    let second = second["token"].as_str().unwrap().to_string();

    let response = authed(server.put("/api/v1/auth/password"), &first)
        .json(&json!({ "current_password": PASSWORD, "new_password": "changed123pass" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = authed(server.get("/api/v1/auth/me"), &first).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let response = authed(server.get("/api/v1/auth/me"), &second).await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_ends_session() {
    let (server, _) = setup().await;
    let (token, _) = register(&server, "alice").await;

    let response = authed(server.post("/api/v1/auth/logout"), &token).await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let response = authed(server.get("/api/v1/auth/me"), &token).await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn repeated_login_failures_are_rate_limited() {
    let (server, _) = setup().await;
    register(&server, "alice").await;

    for _ in 0..5 {
        let response = server
            .post("/api/v1/auth/login")
            .json(&json!({ "username_or_email": "alice", "password": "wrong-password1" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }

    // Even the right password is refused inside the window
    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({ "username_or_email": "alice", "password": PASSWORD }))
        .await;
    assert_eq!(response.status_code(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "RATE_LIMIT");
}

#[tokio::test]
async fn username_and_email_share_one_login_budget() {
    let (server, _) = setup().await;
    register(&server, "alice").await;

    for identifier in ["alice", "alice@example.com", "alice", "ALICE@example.com", "alice"] {
        let response = server
            .post("/api/v1/auth/login")
            .json(&json!({ "username_or_email": identifier, "password": "wrong-password1" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }

    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({ "username_or_email": "alice@example.com", "password": PASSWORD }))
        .await;
    assert_eq!(response.status_code(), StatusCode::TOO_MANY_REQUESTS);

    // Someone else's budget is untouched
    register(&server, "bob").await;
    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({ "username_or_email": "bob", "password": PASSWORD }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn banned_users_lose_access() {
    let (server, _) = setup().await;
    let (admin_token, admin_id) = register(&server, "admin").await;
    let (token, user_id) = register(&server, "alice").await;

    let response = authed(
        server.put(&format!("/api/v1/admin/users/{}/status", user_id)),
        &admin_token,
    )
    .json(&json!({ "status": "banned" }))
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = authed(server.get("/api/v1/auth/me"), &token).await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({ "username_or_email": "alice", "password": PASSWORD }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "USER_BANNED");

    // Admins cannot ban themselves
    let response = authed(
        server.put(&format!("/api/v1/admin/users/{}/status", admin_id)),
        &admin_token,
    )
    .json(&json!({ "status": "banned" }))
    .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}
