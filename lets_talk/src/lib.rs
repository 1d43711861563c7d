//! # Lets Talk
//!
//! Account, session and presence core for the Lets Talk messaging backend.
//!
//! The crate owns the parts of the backend that carry state-machine and
//! concurrency concerns:
//!
//! - **One-time codes** for email verification and password recovery
//!   ([`auth::OneTimeCodeEngine`])
//! - **Bearer tokens** proving identity on requests and real-time
//!   connections ([`auth::TokenService`])
//! - **Presence**: which users are connected right now, and the
//!   online/offline broadcasts that follow ([`presence::PresenceService`])
//!
//! Persistence ([`db`]) and email delivery ([`email`]) are collaborators
//! behind traits so they can be swapped for test doubles.
//!
//! ## Example
//!
//! ```no_run
//! use lets_talk::auth::{AuthManager, RegisterRequest};
//! use lets_talk::clock::SystemClock;
//! use lets_talk::db::InMemoryUserRepository;
//! use lets_talk::email::LogMailer;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let auth = AuthManager::new(
//!     Arc::new(InMemoryUserRepository::new()),
//!     Arc::new(LogMailer),
//!     Arc::new(SystemClock),
//!     "pepper_from_env".to_string(),
//!     "jwt_secret_from_env",
//! );
//!
//! let user = auth
//!     .register(RegisterRequest {
//!         username: "alice".to_string(),
//!         email: "alice@example.com".to_string(),
//!         password: "hunter22".to_string(),
//!         full_name: "Alice".to_string(),
//!         profile_picture: None,
//!     })
//!     .await?;
//! auth.send_verification_code(&user.email).await?;
//! # Ok(())
//! # }
//! ```

/// Registration, login, one-time codes and bearer tokens.
pub mod auth;

/// Injectable time source.
pub mod clock;

/// Credential store: PostgreSQL pool, repository trait and implementations.
pub mod db;

/// Notification dispatcher for one-time codes.
pub mod email;

/// Real-time presence registry and status broadcasts.
pub mod presence;

pub use auth::{AuthError, AuthManager, AuthResult, ErrorKind, User, UserId};
pub use presence::{ConnectionHub, ConnectionId, PresenceRegistry, PresenceService};
