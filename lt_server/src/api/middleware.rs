//! Authentication middleware for protected endpoints.
//!
//! The bearer token is read from the `token` cookie first, then from an
//! `Authorization: Bearer <token>` header. On success the authenticated
//! [`UserId`] is inserted into request extensions for downstream handlers.
//!
//! # Extracting User ID
//!
//! ```rust,no_run
//! use axum::extract::Extension;
//! use lets_talk::UserId;
//!
//! async fn protected_handler(Extension(user_id): Extension<UserId>) -> String {
//!     format!("Authenticated as user {}", user_id)
//! }
//! # let _ = protected_handler;
//! ```

use axum::{
    extract::{Request, State},
    http::{
        HeaderMap,
        header::{AUTHORIZATION, COOKIE},
    },
    middleware::Next,
    response::Response,
};
use lets_talk::{UserId, auth::AuthError};

use super::{AppState, error::ApiError};
use crate::logging::log_security_event;

/// Name of the cookie carrying the bearer token.
pub const TOKEN_COOKIE: &str = "token";

/// Token from the `token` cookie, else from the `Authorization` header.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    cookie_token(headers).or_else(|| bearer_token(headers))
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == TOKEN_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Resolve a token to a live user id.
pub async fn authenticate_token(state: &AppState, token: Option<String>) -> Result<UserId, ApiError> {
    let token = token.ok_or_else(|| ApiError::from(AuthError::MissingToken))?;

    match state.auth_manager.authenticate(&token).await {
        Ok(user) => Ok(user.id),
        Err(e) => {
            log_security_event("token_rejected", None, &e.to_string());
            Err(e.into())
        }
    }
}

/// Authentication middleware that validates the token and injects the user id.
///
/// - **Success**: Injects `UserId` into request extensions and calls the next handler
/// - **Missing token**: `401 Unauthorized`
/// - **Invalid/expired token, or deleted account**: `401 Unauthorized`
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user_id = authenticate_token(&state, extract_token(request.headers())).await?;
    request.extensions_mut().insert(user_id);
    Ok(next.run(request).await)
}
