//! HTTP API integration tests.
//!
//! Drives the full router with `tower::ServiceExt::oneshot` against the
//! in-memory user store.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use lets_talk::{
    AuthManager, ConnectionHub, PresenceRegistry, PresenceService,
    auth::CodePurpose,
    clock::SystemClock,
    db::{InMemoryUserRepository, UserRepository},
    email::LogMailer,
};
use lt_server::api::{AppState, create_router};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    repo: Arc<InMemoryUserRepository>,
}

fn test_app() -> TestApp {
    let repo = Arc::new(InMemoryUserRepository::new());
    let clock = Arc::new(SystemClock);
    let hub = Arc::new(ConnectionHub::new());

    let state = AppState {
        auth_manager: Arc::new(AuthManager::new(
            repo.clone(),
            Arc::new(LogMailer),
            clock.clone(),
            "test_pepper_0123456789".to_string(),
            "test_secret_key_for_testing_only_0123456789",
        )),
        presence: PresenceService::new(
            Arc::new(PresenceRegistry::new()),
            hub.clone(),
            repo.clone(),
            clock,
        ),
        hub,
        database: None,
        cookie_secure: false,
        cors_origins: vec!["http://localhost:5173".to_string()],
    };

    TestApp {
        router: create_router(state),
        repo,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, cookie, body)
    }

    async fn json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Option<String>, Value) {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn register_alice(&self) -> Value {
        let (status, _, body) = self
            .json(
                "POST",
                "/api/auth/register",
                json!({
                    "username": "alice",
                    "email": "alice@example.com",
                    "password": "hunter22",
                    "fullName": "Alice Liddell",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body
    }

    async fn pending_code(&self, purpose: CodePurpose) -> String {
        self.repo
            .find_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap()
            .code(purpose)
            .unwrap()
            .code
            .clone()
    }

    /// Register, verify and log in; returns the token.
    async fn verified_login(&self) -> String {
        self.register_alice().await;
        let (status, _, _) = self
            .json(
                "POST",
                "/api/auth/send-verification",
                json!({"email": "alice@example.com"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let code = self.pending_code(CodePurpose::Verification).await;
        let (status, _, _) = self
            .json(
                "POST",
                "/api/auth/verify-email",
                json!({"email": "alice@example.com", "code": code}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, body) = self
            .json(
                "POST",
                "/api/auth/login",
                json!({"email": "alice@example.com", "password": "hunter22"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["token"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_register_returns_created_user() {
    let app = test_app();
    let body = app.register_alice().await;

    assert_eq!(body["statusCode"], 201);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["username"], "alice");
    assert_eq!(body["data"]["isVerified"], false);
    assert!(body["data"].get("passwordHash").is_none());
}

#[tokio::test]
async fn test_register_rejects_weak_password() {
    let app = test_app();
    let (status, _, body) = app
        .json(
            "POST",
            "/api/auth/register",
            json!({
                "username": "alice",
                "email": "alice@example.com",
                "password": "123",
                "fullName": "Alice",
            }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_unverified_login_is_forbidden() {
    let app = test_app();
    app.register_alice().await;

    let (status, cookie, body) = app
        .json(
            "POST",
            "/api/auth/login",
            json!({"email": "alice@example.com", "password": "hunter22"}),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(cookie.is_none());
    assert_eq!(body["statusCode"], 403);
}

#[tokio::test]
async fn test_login_unknown_email_is_not_found() {
    let app = test_app();
    let (status, _, _) = app
        .json(
            "POST",
            "/api/auth/login",
            json!({"email": "nobody@example.com", "password": "hunter22"}),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wrong_verification_code_is_unauthorized() {
    let app = test_app();
    app.register_alice().await;
    app.json(
        "POST",
        "/api/auth/send-verification",
        json!({"email": "alice@example.com"}),
    )
    .await;

    let code = app.pending_code(CodePurpose::Verification).await;
    let wrong = if code == "123456" { "654321" } else { "123456" };

    let (status, _, _) = app
        .json(
            "POST",
            "/api/auth/verify-email",
            json!({"email": "alice@example.com", "code": wrong}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // the pending code survives a mismatch
    assert_eq!(app.pending_code(CodePurpose::Verification).await, code);
}

#[tokio::test]
async fn test_login_sets_http_only_cookie() {
    let app = test_app();
    app.verified_login().await;

    let (status, cookie, body) = app
        .json(
            "POST",
            "/api/auth/login",
            json!({"email": "alice@example.com", "password": "hunter22"}),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let cookie = cookie.unwrap();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=86400"));
    assert_eq!(body["data"]["user"]["email"], "alice@example.com");
    assert!(body["data"]["token"].is_string());
}

#[tokio::test]
async fn test_current_user_with_cookie_and_bearer() {
    let app = test_app();
    let token = app.verified_login().await;

    let (status, _, body) = app
        .send(
            Request::builder()
                .uri("/api/user/getcurrentuser")
                .header(header::COOKIE, format!("token={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "alice@example.com");

    let (status, _, _) = app
        .send(
            Request::builder()
                .uri("/api/user/getcurrentuser")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = test_app();

    let (status, _, body) = app
        .send(
            Request::builder()
                .uri("/api/user/getcurrentuser")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _, _) = app
        .send(
            Request::builder()
                .uri("/api/user/getcurrentuser")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_password_recovery_flow() {
    let app = test_app();
    app.verified_login().await;

    let (status, _, _) = app
        .json(
            "POST",
            "/api/auth/forgot-password",
            json!({"email": "alice@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let code = app.pending_code(CodePurpose::Recovery).await;
    let (status, _, _) = app
        .json(
            "PUT",
            "/api/auth/reset-password",
            json!({
                "email": "alice@example.com",
                "verificationCode": code,
                "newPassword": "correct horse",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = app
        .json(
            "POST",
            "/api/auth/login",
            json!({"email": "alice@example.com", "password": "hunter22"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = app
        .json(
            "POST",
            "/api/auth/login",
            json!({"email": "alice@example.com", "password": "correct horse"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_profile_update_and_logout() {
    let app = test_app();
    let token = app.verified_login().await;
    let bearer = format!("Bearer {token}");

    let (status, _, body) = app
        .send(
            Request::builder()
                .method("PATCH")
                .uri("/api/user/update")
                .header(header::AUTHORIZATION, &bearer)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"bio": "down the rabbit hole"}).to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["bio"], "down the rabbit hole");

    let (status, cookie, _) = app
        .send(
            Request::builder()
                .method("DELETE")
                .uri("/api/auth/logout")
                .header(header::AUTHORIZATION, &bearer)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(cookie.unwrap().contains("Max-Age=0"));

    let record = app
        .repo
        .find_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status.as_str(), "offline");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = test_app();
    let (status, _, body) = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["statusCode"], 400);
}

#[tokio::test]
async fn test_websocket_rejects_missing_token() {
    let app = test_app();
    let (status, _, _) = app
        .send(
            Request::builder()
                .uri("/ws")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    // not an upgrade request, so the upgrade extractor refuses first
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_health_reports_presence() {
    let app = test_app();
    let (status, _, body) = app
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["presence"]["online_users"], 0);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = test_app();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "trace-me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "trace-me");
}
