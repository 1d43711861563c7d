//! Authentication API handlers.
//!
//! Registration, email verification, login / logout and password recovery.
//! Every handler is a thin adapter over [`lets_talk::AuthManager`].
//!
//! # Examples
//!
//! Register a new user:
//! ```bash
//! curl -X POST http://localhost:8000/api/auth/register \
//!   -H "Content-Type: application/json" \
//!   -d '{"username": "alice", "email": "alice@example.com", "password": "hunter22", "fullName": "Alice"}'
//! ```
//!
//! Login:
//! ```bash
//! curl -X POST http://localhost:8000/api/auth/login \
//!   -H "Content-Type: application/json" \
//!   -d '{"email": "alice@example.com", "password": "hunter22"}'
//! ```

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::header::SET_COOKIE,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use lets_talk::{
    UserId,
    auth::{
        AuthError, CodePurpose, EmailRequest, LoginRequest, PasswordResetConfirm,
        RegisterRequest, User, VerifyEmailRequest,
    },
};
use serde::Serialize;

use super::{
    AppState,
    error::{ApiError, ApiResponse, ApiResult},
    middleware::TOKEN_COOKIE,
};
use crate::{logging::log_security_event, metrics};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// `Set-Cookie` value carrying the token.
fn token_cookie(value: &str, max_age_secs: i64, secure: bool) -> String {
    let same_site = if secure { "SameSite=None; Secure" } else { "SameSite=Lax" };
    format!("{TOKEN_COOKIE}={value}; HttpOnly; Path=/; Max-Age={max_age_secs}; {same_site}")
}

/// Register a new, unverified account.
///
/// # Response
///
/// `201 Created` with the public user profile.
///
/// # Errors
///
/// - `400 Bad Request`: Missing field, invalid username/email, weak password
/// - `409 Conflict`: A verified account owns the email or username
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<User>> {
    let Json(request) = payload?;
    let user = state.auth_manager.register(request).await?;

    Ok(ApiResponse::created(
        user,
        "User registered successfully. Please verify your email.",
    ))
}

/// Log in with email and password.
///
/// Sets the `token` cookie (`HttpOnly`, 24 hours) and also returns the token
/// in the body for clients that send it as a bearer header.
///
/// # Errors
///
/// - `404 Not Found`: No account with this email
/// - `403 Forbidden`: Email not verified yet
/// - `401 Unauthorized`: Wrong password
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;

    let (user, token) = match state.auth_manager.login(request).await {
        Ok(result) => result,
        Err(e) => {
            let outcome = match &e {
                AuthError::UserNotFound => "not_found",
                AuthError::EmailNotVerified => "unverified",
                AuthError::InvalidCredentials => {
                    log_security_event("failed_login", None, "Invalid password attempt");
                    "bad_password"
                }
                _ => "error",
            };
            metrics::login_attempts_total(outcome);
            return Err(e.into());
        }
    };
    metrics::login_attempts_total("success");

    let max_age = state.auth_manager.tokens().validity().num_seconds();
    let cookie = token_cookie(&token.token, max_age, state.cookie_secure);

    Ok((
        [(SET_COOKIE, cookie)],
        ApiResponse::ok(
            LoginData {
                user,
                token: token.token,
                expires_at: token.expires_at,
            },
            "Login successful",
        ),
    ))
}

/// Send a verification code to an unverified account.
///
/// # Errors
///
/// - `400 Bad Request`: Email already verified
/// - `404 Not Found`: No account with this email
/// - `500 Internal Server Error`: Email could not be sent (code discarded)
pub async fn send_verification(
    State(state): State<AppState>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<()>> {
    let Json(request) = payload?;
    issue_code(&state, &request.email, CodePurpose::Verification).await?;
    Ok(ApiResponse::ok((), "Verification code sent successfully"))
}

/// Confirm an email address with the code from the verification email.
///
/// # Errors
///
/// - `400 Bad Request`: Code expired or never requested, already verified
/// - `401 Unauthorized`: Wrong code
pub async fn verify_email(
    State(state): State<AppState>,
    payload: Result<Json<VerifyEmailRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<()>> {
    let Json(request) = payload?;
    state
        .auth_manager
        .verify_email(&request.email, &request.code)
        .await?;
    Ok(ApiResponse::ok((), "Email verified successfully"))
}

/// Send a password recovery code.
pub async fn forgot_password(
    State(state): State<AppState>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<()>> {
    let Json(request) = payload?;
    issue_code(&state, &request.email, CodePurpose::Recovery).await?;
    Ok(ApiResponse::ok((), "Recovery code sent successfully"))
}

/// Set a new password with a recovery code.
///
/// # Errors
///
/// - `400 Bad Request`: Missing fields, weak password, wrong/expired code
/// - `404 Not Found`: No account with this email
pub async fn reset_password(
    State(state): State<AppState>,
    payload: Result<Json<PasswordResetConfirm>, JsonRejection>,
) -> ApiResult<ApiResponse<()>> {
    let Json(request) = payload?;
    state.auth_manager.reset_password(request).await?;
    Ok(ApiResponse::ok((), "Password reset successfully"))
}

/// Log out: mark the user offline and clear the cookie.
///
/// The token stays cryptographically valid until it expires; clients must
/// drop it.
pub async fn logout(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> ApiResult<impl IntoResponse> {
    state.auth_manager.logout(user_id).await?;

    Ok((
        [(SET_COOKIE, token_cookie("", 0, state.cookie_secure))],
        ApiResponse::ok((), "Logged out successfully"),
    ))
}

async fn issue_code(state: &AppState, email: &str, purpose: CodePurpose) -> Result<(), ApiError> {
    let result = match purpose {
        CodePurpose::Verification => state.auth_manager.send_verification_code(email).await,
        CodePurpose::Recovery => state.auth_manager.request_recovery_code(email).await,
    };

    match result {
        Ok(()) => {
            metrics::codes_issued_total(purpose);
            Ok(())
        }
        Err(e) => {
            if matches!(e, AuthError::Delivery(_)) {
                metrics::code_delivery_failures_total(purpose);
            }
            Err(e.into())
        }
    }
}
