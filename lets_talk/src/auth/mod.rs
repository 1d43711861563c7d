//! Authentication module providing registration, verification, login and
//! password recovery.
//!
//! This module implements:
//! - Argon2id password hashing with server-side pepper
//! - Stateless JWT bearer tokens (24-hour validity, no refresh)
//! - Single-use 6-digit codes for email verification and password recovery
//!   (3-minute expiry, one slot per purpose)
//!
//! ## Example
//!
//! ```no_run
//! use lets_talk::auth::{AuthManager, LoginRequest};
//! use lets_talk::clock::SystemClock;
//! use lets_talk::db::{Database, DatabaseConfig, PgUserRepository};
//! use lets_talk::email::LogMailer;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&DatabaseConfig::default()).await?;
//!     let auth = AuthManager::new(
//!         Arc::new(PgUserRepository::new(db.pool().clone())),
//!         Arc::new(LogMailer),
//!         Arc::new(SystemClock),
//!         "secret_pepper".to_string(),
//!         "jwt_secret",
//!     );
//!
//!     let (user, token) = auth
//!         .login(LoginRequest {
//!             email: "alice@example.com".to_string(),
//!             password: "hunter22".to_string(),
//!         })
//!         .await?;
//!     println!("{} logged in, token valid until {}", user.username, token.expires_at);
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod manager;
pub mod models;
pub mod otp;
pub mod password;
pub mod token;

pub use errors::{AuthError, AuthResult, CodeError, ErrorKind, TokenError};
pub use manager::AuthManager;
pub use models::{
    ChangePasswordRequest, CodePurpose, EmailRequest, IssuedToken, LoginRequest, NewUser,
    OneTimeCode, PasswordResetConfirm, ProfileUpdate, RegisterRequest, TokenClaims, User, UserId,
    UserRecord, UserStatus, UserUpdate, VerifyEmailRequest,
};
pub use otp::OneTimeCodeEngine;
pub use token::TokenService;
