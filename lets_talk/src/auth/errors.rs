//! Authentication error types.

use thiserror::Error;

use super::models::CodePurpose;
use crate::email::MailError;

/// Stable classification of every failure the core can report.
///
/// Callers map a kind to a transport status (HTTP code, real-time
/// `errorEvent.statusCode`) instead of matching individual errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or malformed input the user can correct
    Validation,
    /// Identity does not exist
    NotFound,
    /// Duplicate unique field
    Conflict,
    /// Missing/invalid/expired token or wrong password
    Unauthorized,
    /// Valid identity, action not allowed
    Forbidden,
    /// One-time code or recovery window elapsed
    Expired,
    /// Notification dispatch failed
    DeliveryFailure,
    /// Persistence failure or unexpected fault
    Internal,
}

impl ErrorKind {
    /// HTTP-equivalent status code.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Validation | ErrorKind::Expired => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::DeliveryFailure | ErrorKind::Internal => 500,
        }
    }
}

/// Why a supplied one-time code was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodeError {
    #[error("no code is pending")]
    NotRequested,

    #[error("code has expired")]
    Expired,

    #[error("code does not match")]
    Mismatch,
}

/// Why a bearer token was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Malformed, forged, or signed with another secret
    #[error("Invalid token")]
    Invalid,

    /// Well-formed but past its validity window
    #[error("Token has expired")]
    Expired,
}

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Password hashing failed
    #[error("Password hashing failed")]
    HashingFailed,

    /// JWT encoding error
    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    /// Required input missing or malformed
    #[error("{0}")]
    Validation(String),

    /// Invalid username format
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    /// Password too weak
    #[error("Password too weak: {0}")]
    WeakPassword(String),

    /// Email address does not parse
    #[error("Invalid email address")]
    InvalidEmail,

    /// User not found
    #[error("User not found")]
    UserNotFound,

    /// A verified account already owns the email or username
    #[error("User with this email or username already exists")]
    UserExists,

    /// Wrong password on login
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Login attempted before email verification
    #[error("Please verify your email address before logging in")]
    EmailNotVerified,

    /// Verification requested for an already verified account
    #[error("Email is already verified")]
    AlreadyVerified,

    /// Wrong current password on password change
    #[error("Invalid current password")]
    InvalidCurrentPassword,

    /// No bearer token on a protected request
    #[error("Not authorized, token missing")]
    MissingToken,

    /// Bearer token rejected
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Token is valid but the identity it names is gone
    #[error("Invalid token or user no longer exists")]
    AccountGone,

    /// One-time code rejected
    #[error("{}", code_message(.purpose, .reason))]
    Code {
        purpose: CodePurpose,
        reason: CodeError,
    },

    /// Code could not be mailed; the code has been invalidated
    #[error("Email could not be sent. Please try again later.")]
    Delivery(#[source] MailError),

    /// Unexpected internal fault
    #[error("Internal error: {0}")]
    Internal(String),
}

fn code_message(purpose: &CodePurpose, reason: &CodeError) -> &'static str {
    match (purpose, reason) {
        (CodePurpose::Verification, CodeError::Mismatch) => "Invalid verification code",
        (CodePurpose::Verification, _) => "Verification code has expired",
        (CodePurpose::Recovery, CodeError::Mismatch) => "Invalid recovery code",
        (CodePurpose::Recovery, CodeError::Expired) => "Recovery code has expired",
        (CodePurpose::Recovery, CodeError::NotRequested) => "No recovery code has been requested",
    }
}

impl AuthError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Database(_)
            | AuthError::HashingFailed
            | AuthError::JwtError(_)
            | AuthError::Internal(_) => ErrorKind::Internal,
            AuthError::Validation(_)
            | AuthError::InvalidUsername(_)
            | AuthError::WeakPassword(_)
            | AuthError::InvalidEmail
            | AuthError::AlreadyVerified
            | AuthError::InvalidCurrentPassword => ErrorKind::Validation,
            AuthError::UserNotFound => ErrorKind::NotFound,
            AuthError::UserExists => ErrorKind::Conflict,
            AuthError::InvalidCredentials
            | AuthError::MissingToken
            | AuthError::Token(_)
            | AuthError::AccountGone => ErrorKind::Unauthorized,
            AuthError::EmailNotVerified => ErrorKind::Forbidden,
            AuthError::Code { purpose, reason } => match (purpose, reason) {
                (_, CodeError::Expired | CodeError::NotRequested) => ErrorKind::Expired,
                (CodePurpose::Verification, CodeError::Mismatch) => ErrorKind::Unauthorized,
                (CodePurpose::Recovery, CodeError::Mismatch) => ErrorKind::Validation,
            },
            AuthError::Delivery(_) => ErrorKind::DeliveryFailure,
        }
    }

    /// Shorthand for `self.kind().status_code()`.
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Database, hashing and JWT errors are sanitized to prevent information
    /// disclosure about the internal system structure.
    pub fn client_message(&self) -> String {
        match self {
            AuthError::Database(_)
            | AuthError::HashingFailed
            | AuthError::JwtError(_)
            | AuthError::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
