//! Authentication manager implementation.

use log::{error, info, warn};
use std::sync::Arc;

use super::{
    errors::{AuthError, AuthResult},
    models::{
        ChangePasswordRequest, CodePurpose, IssuedToken, LoginRequest, NewUser,
        PasswordResetConfirm, ProfileUpdate, RegisterRequest, User, UserId, UserRecord,
        UserStatus, UserUpdate,
    },
    otp::{OneTimeCodeEngine, check_pending},
    password::{
        PasswordHasher, normalize_email, validate_email, validate_password, validate_username,
    },
    token::TokenService,
};
use crate::{
    clock::Clock,
    db::UserRepository,
    email::{Mailer, templates},
};

/// Authentication manager
///
/// Ties the one-time-code engine and token service to the credential store
/// and the mailer for the account flows: registration, verification, login,
/// recovery and profile maintenance.
#[derive(Clone)]
pub struct AuthManager {
    users: Arc<dyn UserRepository>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    codes: OneTimeCodeEngine,
    tokens: TokenService,
    passwords: PasswordHasher,
}

impl AuthManager {
    /// Create a new authentication manager
    ///
    /// # Arguments
    ///
    /// * `users` - Credential store
    /// * `mailer` - Notification dispatcher for one-time codes
    /// * `clock` - Time source for code and token expiry
    /// * `pepper` - Server-side pepper for password hashing
    /// * `jwt_secret` - Secret key for token signing
    pub fn new(
        users: Arc<dyn UserRepository>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        pepper: String,
        jwt_secret: &str,
    ) -> Self {
        Self {
            codes: OneTimeCodeEngine::new(users.clone(), clock.clone()),
            tokens: TokenService::new(jwt_secret, clock.clone()),
            passwords: PasswordHasher::new(pepper),
            users,
            mailer,
            clock,
        }
    }

    pub fn codes(&self) -> &OneTimeCodeEngine {
        &self.codes
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn users(&self) -> &Arc<dyn UserRepository> {
        &self.users
    }

    /// Register a new, unverified user
    ///
    /// Unverified records that share the email or username are deleted and
    /// superseded; a verified one blocks registration.
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - A required field is empty
    /// * `AuthError::InvalidUsername` / `InvalidEmail` / `WeakPassword`
    /// * `AuthError::UserExists` - A verified account owns the email or username
    pub async fn register(&self, request: RegisterRequest) -> AuthResult<User> {
        let username = request.username.trim().to_string();
        let email = normalize_email(&request.email);
        let full_name = request.full_name.trim().to_string();

        if username.is_empty()
            || email.is_empty()
            || request.password.is_empty()
            || full_name.is_empty()
        {
            return Err(AuthError::Validation(
                "Please provide all required fields".to_string(),
            ));
        }

        validate_username(&username)?;
        validate_email(&email)?;
        validate_password(&request.password)?;

        let existing = self
            .users
            .find_by_email_or_username(&email, &username)
            .await?;

        if existing.iter().any(|record| record.is_verified) {
            return Err(AuthError::UserExists);
        }

        for stale in existing {
            info!(
                "Superseding unverified account {} ({}) by new registration",
                stale.id, stale.username
            );
            self.users.delete_by_id(stale.id).await?;
        }

        let password_hash = self.passwords.hash(&request.password)?;

        let record = self
            .users
            .create_record(NewUser {
                username,
                email,
                full_name,
                profile_picture: request.profile_picture.unwrap_or_default(),
                password_hash,
                created_at: self.clock.now(),
            })
            .await?;

        info!("Registered user {} ({})", record.id, record.username);
        Ok(User::from(&record))
    }

    /// Login with email and password
    ///
    /// # Returns
    ///
    /// * `AuthResult<(User, IssuedToken)>` - User and bearer token
    ///
    /// # Errors
    ///
    /// * `AuthError::UserNotFound` - No account with this email
    /// * `AuthError::EmailNotVerified` - Account not verified yet
    /// * `AuthError::InvalidCredentials` - Wrong password
    pub async fn login(&self, request: LoginRequest) -> AuthResult<(User, IssuedToken)> {
        let email = normalize_email(&request.email);
        if email.is_empty() || request.password.is_empty() {
            return Err(AuthError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let record = self.find_by_email(&email).await?;

        if !record.is_verified {
            return Err(AuthError::EmailNotVerified);
        }

        if !self.passwords.matches(&request.password, &record.password_hash) {
            warn!("Failed login for user {}", record.id);
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.tokens.issue(record.id)?;

        let now = self.clock.now();
        self.users
            .update_fields(
                record.id,
                UserUpdate {
                    last_seen: Some(now),
                    ..UserUpdate::default()
                },
            )
            .await?;

        let mut user = User::from(&record);
        user.last_seen = now;
        Ok((user, token))
    }

    /// Email a verification code to an unverified account
    ///
    /// # Errors
    ///
    /// * `AuthError::UserNotFound` - No account with this email
    /// * `AuthError::AlreadyVerified` - Nothing to verify
    /// * `AuthError::Delivery` - Mail could not be sent; the code was dropped
    pub async fn send_verification_code(&self, email: &str) -> AuthResult<()> {
        let record = self.find_by_email(&require_email(email)?).await?;

        if record.is_verified {
            return Err(AuthError::AlreadyVerified);
        }

        self.issue_code(&record, CodePurpose::Verification).await
    }

    /// Confirm an email address with the code that was sent to it
    ///
    /// The code is consumed and the account marked verified in one update.
    pub async fn verify_email(&self, email: &str, code: &str) -> AuthResult<()> {
        let email = normalize_email(email);
        if email.is_empty() || code.is_empty() {
            return Err(AuthError::Validation(
                "Email and verification code are required".to_string(),
            ));
        }

        let record = self.find_by_email(&email).await?;

        if record.is_verified {
            return Err(AuthError::AlreadyVerified);
        }

        self.codes
            .validate_and_apply(
                record.id,
                code,
                CodePurpose::Verification,
                UserUpdate {
                    is_verified: Some(true),
                    ..UserUpdate::default()
                },
            )
            .await?;

        info!("User {} verified their email", record.id);
        Ok(())
    }

    /// Email a password recovery code
    ///
    /// # Errors
    ///
    /// * `AuthError::UserNotFound` - No account with this email
    /// * `AuthError::Delivery` - Mail could not be sent; the code was dropped
    pub async fn request_recovery_code(&self, email: &str) -> AuthResult<()> {
        let record = self.find_by_email(&require_email(email)?).await?;
        self.issue_code(&record, CodePurpose::Recovery).await
    }

    /// Set a new password using a recovery code
    ///
    /// The password is left unchanged unless the code is accepted.
    pub async fn reset_password(&self, request: PasswordResetConfirm) -> AuthResult<()> {
        let email = normalize_email(&request.email);
        if email.is_empty() || request.verification_code.is_empty() || request.new_password.is_empty()
        {
            return Err(AuthError::Validation(
                "Email, verification code, and new password are required".to_string(),
            ));
        }
        validate_password(&request.new_password)?;

        let record = self.find_by_email(&email).await?;
        if let Err(reason) = check_pending(
            record.code(CodePurpose::Recovery),
            &request.verification_code,
            self.clock.now(),
        ) {
            warn!("Rejected recovery code for user {}: {}", record.id, reason);
            return Err(AuthError::Code {
                purpose: CodePurpose::Recovery,
                reason,
            });
        }

        let password_hash = self.passwords.hash(&request.new_password)?;

        self.codes
            .validate_and_apply(
                record.id,
                &request.verification_code,
                CodePurpose::Recovery,
                UserUpdate {
                    password_hash: Some(password_hash),
                    ..UserUpdate::default()
                },
            )
            .await?;

        info!("Password reset for user {}", record.id);
        Ok(())
    }

    /// Mark the user offline. The token itself stays valid until it expires.
    pub async fn logout(&self, user_id: UserId) -> AuthResult<()> {
        match self
            .users
            .update_fields(
                user_id,
                UserUpdate::presence(UserStatus::Offline, self.clock.now()),
            )
            .await
        {
            Ok(()) | Err(AuthError::UserNotFound) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Resolve a bearer token to a live account
    ///
    /// # Errors
    ///
    /// * `AuthError::Token` - Invalid or expired token
    /// * `AuthError::AccountGone` - Token names a user that no longer exists
    pub async fn authenticate(&self, token: &str) -> AuthResult<User> {
        let user_id = self.tokens.verify(token)?;

        self.users
            .find_by_id(user_id)
            .await?
            .map(|record| User::from(&record))
            .ok_or(AuthError::AccountGone)
    }

    /// Get the public profile of a user
    pub async fn current_user(&self, user_id: UserId) -> AuthResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(|record| User::from(&record))
            .ok_or(AuthError::UserNotFound)
    }

    /// Update editable profile fields and return the new profile
    pub async fn update_profile(&self, user_id: UserId, update: ProfileUpdate) -> AuthResult<User> {
        let full_name = match update.full_name {
            Some(name) if name.trim().is_empty() => {
                return Err(AuthError::Validation("Full name cannot be empty".to_string()));
            }
            Some(name) => Some(name.trim().to_string()),
            None => None,
        };

        let patch = UserUpdate {
            full_name,
            profile_picture: update.profile_picture,
            bio: update.bio,
            ..UserUpdate::default()
        };

        if !patch.is_empty() {
            self.users.update_fields(user_id, patch).await?;
        }

        self.current_user(user_id).await
    }

    /// Change password after checking the current one
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - Missing fields
    /// * `AuthError::WeakPassword` - New password too short
    /// * `AuthError::InvalidCurrentPassword` - Current password is wrong
    pub async fn change_password(
        &self,
        user_id: UserId,
        request: ChangePasswordRequest,
    ) -> AuthResult<()> {
        if request.current_password.is_empty() || request.new_password.is_empty() {
            return Err(AuthError::Validation(
                "Please enter both current and new password".to_string(),
            ));
        }
        validate_password(&request.new_password)?;

        let record = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !self
            .passwords
            .matches(&request.current_password, &record.password_hash)
        {
            return Err(AuthError::InvalidCurrentPassword);
        }

        let password_hash = self.passwords.hash(&request.new_password)?;
        self.users
            .update_fields(
                user_id,
                UserUpdate {
                    password_hash: Some(password_hash),
                    ..UserUpdate::default()
                },
            )
            .await
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<UserRecord> {
        self.users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Generate a code, mail it, and drop it again if the mail fails.
    async fn issue_code(&self, record: &UserRecord, purpose: CodePurpose) -> AuthResult<()> {
        let code = self.codes.generate(record.id, purpose).await?;
        let message = templates::code_email(purpose, &record.email, &code.code, self.codes.ttl());

        if let Err(e) = self.mailer.send(message).await {
            error!(
                "Failed to deliver {} code to user {}: {}",
                purpose, record.id, e
            );
            self.codes
                .invalidate_on_delivery_failure(record.id, purpose)
                .await?;
            return Err(AuthError::Delivery(e));
        }

        info!("Sent {} code to user {}", purpose, record.id);
        Ok(())
    }
}

fn require_email(email: &str) -> AuthResult<String> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AuthError::Validation("Email is required".to_string()));
    }
    Ok(email)
}
