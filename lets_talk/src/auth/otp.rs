//! One-time codes for email verification and password recovery.
//!
//! A code is six random decimal digits with a short lifetime. It lives in the
//! user record slot for its [`CodePurpose`]; issuing a new one overwrites the
//! old, and a successful validation clears the slot so the code cannot be
//! replayed.

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use rand::Rng;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::{
    errors::{AuthError, AuthResult, CodeError},
    models::{CodePurpose, OneTimeCode, UserId, UserUpdate},
};
use crate::{clock::Clock, db::UserRepository};

/// Lifetime of a freshly issued code.
pub const CODE_TTL_SECS: i64 = 180;

/// Smallest code value (six digits, no leading zero).
pub const CODE_MIN: u32 = 100_000;

/// Largest code value.
pub const CODE_MAX: u32 = 999_999;

impl OneTimeCode {
    /// Draw a new code, valid until `now + ttl`.
    pub fn generate(now: DateTime<Utc>, ttl: Duration) -> Self {
        let value = rand::rng().random_range(CODE_MIN..=CODE_MAX);
        Self {
            code: value.to_string(),
            expires_at: now + ttl,
        }
    }

    /// A code is still good at exactly `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Check a supplied string against this code.
    ///
    /// Comparison is exact (no trimming or case folding) and constant-time.
    pub fn check(&self, supplied: &str, now: DateTime<Utc>) -> Result<(), CodeError> {
        if self.is_expired(now) {
            return Err(CodeError::Expired);
        }
        if !bool::from(self.code.as_bytes().ct_eq(supplied.as_bytes())) {
            return Err(CodeError::Mismatch);
        }
        Ok(())
    }
}

/// Check a supplied code against whatever is pending in a slot.
pub fn check_pending(
    pending: Option<&OneTimeCode>,
    supplied: &str,
    now: DateTime<Utc>,
) -> Result<(), CodeError> {
    pending
        .ok_or(CodeError::NotRequested)?
        .check(supplied, now)
}

/// Issues, validates and invalidates one-time codes on user records
#[derive(Clone)]
pub struct OneTimeCodeEngine {
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl OneTimeCodeEngine {
    pub fn new(users: Arc<dyn UserRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            users,
            clock,
            ttl: Duration::seconds(CODE_TTL_SECS),
        }
    }

    /// Override the code lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a new code for `purpose`, replacing any pending one.
    ///
    /// # Errors
    ///
    /// * `AuthError::UserNotFound` - No such user
    /// * `AuthError::Database` - Store failure
    pub async fn generate(&self, user_id: UserId, purpose: CodePurpose) -> AuthResult<OneTimeCode> {
        let code = OneTimeCode::generate(self.clock.now(), self.ttl);
        self.users
            .update_fields(
                user_id,
                UserUpdate::default().with_code(purpose, Some(code.clone())),
            )
            .await?;

        debug!(
            "Issued {} code for user {} (expires {})",
            purpose, user_id, code.expires_at
        );
        Ok(code)
    }

    /// Validate and consume a code.
    ///
    /// # Errors
    ///
    /// * `AuthError::Code { reason: NotRequested, .. }` - Nothing pending
    /// * `AuthError::Code { reason: Expired, .. }` - Past `expires_at`
    /// * `AuthError::Code { reason: Mismatch, .. }` - Wrong digits
    pub async fn validate(
        &self,
        user_id: UserId,
        supplied: &str,
        purpose: CodePurpose,
    ) -> AuthResult<()> {
        self.validate_and_apply(user_id, supplied, purpose, UserUpdate::default())
            .await
    }

    /// Validate a code and, on success, write `update` in the same record
    /// update that clears the code.
    ///
    /// Used when consuming the code must coincide with another change, e.g.
    /// marking the account verified or storing a new password hash.
    pub async fn validate_and_apply(
        &self,
        user_id: UserId,
        supplied: &str,
        purpose: CodePurpose,
        update: UserUpdate,
    ) -> AuthResult<()> {
        let record = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if let Err(reason) = check_pending(record.code(purpose), supplied, self.clock.now()) {
            warn!("Rejected {} code for user {}: {}", purpose, user_id, reason);
            return Err(AuthError::Code { purpose, reason });
        }

        self.users
            .update_fields(user_id, update.with_code(purpose, None))
            .await
    }

    /// Drop a pending code without checking it.
    ///
    /// Called when the notification could not be delivered, so a code the
    /// user never received does not stay live.
    pub async fn invalidate_on_delivery_failure(
        &self,
        user_id: UserId,
        purpose: CodePurpose,
    ) -> AuthResult<()> {
        self.users
            .update_fields(user_id, UserUpdate::default().with_code(purpose, None))
            .await
    }
}
