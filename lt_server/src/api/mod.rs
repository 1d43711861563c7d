//! HTTP/WebSocket API for the Lets Talk backend.
//!
//! # Modules
//!
//! - [`auth`]: Registration, verification, login/logout, password recovery
//! - [`users`]: Profile of the authenticated user
//! - [`websocket`]: Real-time presence channel
//! - [`middleware`]: Token authentication for protected endpoints
//! - [`error`]: JSON response envelopes
//!
//! # Endpoints Overview
//!
//! ```text
//! POST   /api/auth/register          - Register user (public)
//! POST   /api/auth/login             - Login, sets `token` cookie (public)
//! POST   /api/auth/send-verification - Email a verification code (public)
//! POST   /api/auth/verify-email      - Confirm email with code (public)
//! POST   /api/auth/forgot-password   - Email a recovery code (public)
//! PUT    /api/auth/reset-password    - Set password with recovery code (public)
//! DELETE /api/auth/logout            - Logout (auth required)
//! GET    /api/user/getcurrentuser    - Current profile (auth required)
//! PATCH  /api/user/update            - Edit profile (auth required)
//! PUT    /api/user/changepassword    - Change password (auth required)
//! GET    /ws                         - WebSocket (auth required)
//! GET    /health                     - Health check (public)
//! ```
//!
//! Protected endpoints accept the token from the `token` cookie or an
//! `Authorization: Bearer` header. The WebSocket additionally accepts a
//! `?token=` query parameter.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use lets_talk::{
//!     AuthManager, ConnectionHub, PresenceRegistry, PresenceService,
//!     clock::SystemClock, db::InMemoryUserRepository, email::LogMailer,
//! };
//! use lt_server::api::{AppState, create_router};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let users = Arc::new(InMemoryUserRepository::new());
//! let clock = Arc::new(SystemClock);
//! let hub = Arc::new(ConnectionHub::new());
//!
//! let state = AppState {
//!     auth_manager: Arc::new(AuthManager::new(
//!         users.clone(),
//!         Arc::new(LogMailer),
//!         clock.clone(),
//!         "pepper".to_string(),
//!         "secret",
//!     )),
//!     presence: PresenceService::new(Arc::new(PresenceRegistry::new()), hub.clone(), users, clock),
//!     hub,
//!     database: None,
//!     cookie_secure: false,
//!     cors_origins: vec!["http://localhost:5173".to_string()],
//! };
//!
//! let app = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod error;
pub mod middleware;
pub mod rate_limiter;
pub mod request_id;
pub mod users;
pub mod websocket;

use axum::{
    Router,
    extract::State,
    http::{
        HeaderValue, Method, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    response::{IntoResponse, Json},
    routing::{delete, get, patch, post, put},
};
use lets_talk::{AuthManager, ConnectionHub, PresenceService, db::Database};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Application state shared across all HTTP handlers and WebSocket connections.
///
/// Cloned per request; everything heavy sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub auth_manager: Arc<AuthManager>,
    pub presence: PresenceService,
    pub hub: Arc<ConnectionHub>,
    /// `None` when running on the in-memory store
    pub database: Option<Database>,
    /// Mark the `token` cookie `Secure`
    pub cookie_secure: bool,
    pub cors_origins: Vec<String>,
}

/// Create the complete API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    let public_auth = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/send-verification", post(auth::send_verification))
        .route("/verify-email", post(auth::verify_email))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", put(auth::reset_password));

    let protected_auth = Router::new()
        .route("/logout", delete(auth::logout))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let user_routes = Router::new()
        .route("/getcurrentuser", get(users::current_user))
        .route("/update", patch(users::update_profile))
        .route("/changepassword", put(users::change_password))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let cors = cors_layer(&state.cors_origins);

    Router::new()
        .route("/health", get(health_check))
        // WebSocket authenticates itself before the upgrade
        .route("/ws", get(websocket::websocket_handler))
        .nest("/api/auth", public_auth.merge(protected_auth))
        .nest("/api/user", user_routes)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring unusable CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when the database answers (or no database is
/// configured), `503 Service Unavailable` otherwise.
///
/// ```bash
/// curl http://localhost:8000/health
/// # {"status":"healthy","database":true,"presence":{"online_users":3,"connections":4},...}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = match &state.database {
        Some(db) => db.health_check().await.is_ok(),
        None => true,
    };

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if db_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "presence": {
            "online_users": state.presence.registry().online_count(),
            "connections": state.hub.connection_count(),
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
