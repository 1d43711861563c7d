//! Integration tests for the account flows.
//!
//! Covers registration, verification, login, recovery and profile changes
//! against the in-memory credential store and a simulated clock.

use async_trait::async_trait;
use chrono::Duration;
use lets_talk::auth::{
    AuthError, AuthManager, ChangePasswordRequest, CodeError, CodePurpose, ErrorKind,
    LoginRequest, PasswordResetConfirm, ProfileUpdate, RegisterRequest, TokenError, UserStatus,
};
use lets_talk::clock::{Clock, ManualClock};
use lets_talk::db::{InMemoryUserRepository, UserRepository};
use lets_talk::email::{MailError, Mailer, OutgoingEmail};
use std::sync::{Arc, Mutex};

const PEPPER: &str = "test_pepper_0123456789";
const SECRET: &str = "test_secret_key_for_testing_only_0123456789";

/// Mailer that records messages, or fails every send when `failing`.
#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    failing: bool,
}

impl RecordingMailer {
    fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: OutgoingEmail) -> Result<(), MailError> {
        if self.failing {
            return Err(MailError::Build("smtp unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

struct Harness {
    auth: AuthManager,
    repo: Arc<InMemoryUserRepository>,
    clock: Arc<ManualClock>,
    mailer: Arc<RecordingMailer>,
}

fn harness_with(mailer: RecordingMailer) -> Harness {
    let repo = Arc::new(InMemoryUserRepository::new());
    let clock = Arc::new(ManualClock::starting_now());
    let mailer = Arc::new(mailer);
    let auth = AuthManager::new(
        repo.clone(),
        mailer.clone(),
        clock.clone(),
        PEPPER.to_string(),
        SECRET,
    );
    Harness {
        auth,
        repo,
        clock,
        mailer,
    }
}

fn harness() -> Harness {
    harness_with(RecordingMailer::default())
}

fn registration(username: &str, email: &str) -> RegisterRequest {
    RegisterRequest {
        username: username.to_string(),
        email: email.to_string(),
        password: "hunter22".to_string(),
        full_name: "Test User".to_string(),
        profile_picture: None,
    }
}

fn login(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    }
}

async fn pending_code(h: &Harness, email: &str, purpose: CodePurpose) -> Option<String> {
    h.repo
        .find_by_email(email)
        .await
        .unwrap()
        .and_then(|record| record.code(purpose).map(|c| c.code.clone()))
}

/// Register and verify an account, returning nothing but a usable login.
async fn verified_user(h: &Harness, username: &str, email: &str) {
    h.auth.register(registration(username, email)).await.unwrap();
    h.auth.send_verification_code(email).await.unwrap();
    let code = pending_code(h, email, CodePurpose::Verification)
        .await
        .expect("code should be pending");
    h.auth.verify_email(email, &code).await.unwrap();
}

#[tokio::test]
async fn test_register_creates_unverified_offline_user() {
    let h = harness();
    let user = h.auth.register(registration("alice", "A@X.com")).await.unwrap();

    assert_eq!(user.email, "a@x.com");
    assert!(!user.is_verified);
    assert_eq!(user.status, UserStatus::Offline);
}

#[tokio::test]
async fn test_register_supersedes_unverified_duplicate() {
    let h = harness();
    let first = h.auth.register(registration("alice", "a@x.com")).await.unwrap();

    let second = h
        .auth
        .register(registration("alice", "a@x.com"))
        .await
        .expect("unverified record should be superseded");

    assert_ne!(first.id, second.id);
    assert!(h.repo.find_by_id(first.id).await.unwrap().is_none());
    assert_eq!(h.repo.len().await, 1);
}

#[tokio::test]
async fn test_register_conflicts_with_verified_account() {
    let h = harness();
    verified_user(&h, "alice", "a@x.com").await;

    let same_email = h.auth.register(registration("alice2", "a@x.com")).await;
    assert!(matches!(same_email, Err(AuthError::UserExists)));

    let same_username = h.auth.register(registration("alice", "b@x.com")).await;
    let err = same_username.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.status_code(), 409);
}

#[tokio::test]
async fn test_register_validation() {
    let h = harness();

    let mut missing = registration("alice", "a@x.com");
    missing.full_name = "  ".to_string();
    assert_eq!(
        h.auth.register(missing).await.unwrap_err().kind(),
        ErrorKind::Validation
    );

    let mut short = registration("alice", "a@x.com");
    short.password = "12345".to_string();
    assert!(matches!(
        h.auth.register(short).await,
        Err(AuthError::WeakPassword(_))
    ));

    assert!(matches!(
        h.auth.register(registration("alice", "not-an-email")).await,
        Err(AuthError::InvalidEmail)
    ));
}

#[tokio::test]
async fn test_login_before_verification_is_forbidden() {
    let h = harness();
    h.auth.register(registration("alice", "a@x.com")).await.unwrap();

    let err = h.auth.login(login("a@x.com", "hunter22")).await.unwrap_err();
    assert!(matches!(err, AuthError::EmailNotVerified));
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_login_error_order() {
    let h = harness();
    assert!(matches!(
        h.auth.login(login("nobody@x.com", "hunter22")).await,
        Err(AuthError::UserNotFound)
    ));

    h.auth.register(registration("alice", "a@x.com")).await.unwrap();
    // Unverified is reported even with a wrong password.
    assert!(matches!(
        h.auth.login(login("a@x.com", "wrong-password")).await,
        Err(AuthError::EmailNotVerified)
    ));
}

#[tokio::test]
async fn test_verified_login_issues_token() {
    let h = harness();
    verified_user(&h, "alice", "a@x.com").await;

    assert!(matches!(
        h.auth.login(login("a@x.com", "wrong-password")).await,
        Err(AuthError::InvalidCredentials)
    ));

    let (user, token) = h.auth.login(login("a@x.com", "hunter22")).await.unwrap();
    assert!(user.is_verified);
    assert_eq!(token.expires_at, h.clock.now() + Duration::hours(24));

    let authenticated = h.auth.authenticate(&token.token).await.unwrap();
    assert_eq!(authenticated.id, user.id);
}

#[tokio::test]
async fn test_token_for_deleted_account_is_rejected() {
    let h = harness();
    verified_user(&h, "alice", "a@x.com").await;
    let (user, token) = h.auth.login(login("a@x.com", "hunter22")).await.unwrap();

    h.repo.delete_by_id(user.id).await.unwrap();

    let err = h.auth.authenticate(&token.token).await.unwrap_err();
    assert!(matches!(err, AuthError::AccountGone));
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_token_expires_with_clock() {
    let h = harness();
    verified_user(&h, "alice", "a@x.com").await;
    let (_, token) = h.auth.login(login("a@x.com", "hunter22")).await.unwrap();

    h.clock.advance(Duration::hours(24) + Duration::seconds(1));
    assert!(matches!(
        h.auth.authenticate(&token.token).await,
        Err(AuthError::Token(TokenError::Expired))
    ));
}

#[tokio::test]
async fn test_verification_code_is_single_use() {
    let h = harness();
    h.auth.register(registration("alice", "a@x.com")).await.unwrap();
    h.auth.send_verification_code("a@x.com").await.unwrap();

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "a@x.com");

    let code = pending_code(&h, "a@x.com", CodePurpose::Verification)
        .await
        .unwrap();
    assert!(sent[0].text_body.contains(&code));

    let record = h.repo.find_by_email("a@x.com").await.unwrap().unwrap();
    let codes = h.auth.codes();
    codes
        .validate(record.id, &code, CodePurpose::Verification)
        .await
        .unwrap();

    let replay = codes
        .validate(record.id, &code, CodePurpose::Verification)
        .await;
    assert!(matches!(
        replay,
        Err(AuthError::Code {
            reason: CodeError::NotRequested,
            ..
        })
    ));
}

#[tokio::test]
async fn test_verify_email_consumes_code_and_marks_verified() {
    let h = harness();
    h.auth.register(registration("alice", "a@x.com")).await.unwrap();
    h.auth.send_verification_code("a@x.com").await.unwrap();
    let code = pending_code(&h, "a@x.com", CodePurpose::Verification)
        .await
        .unwrap();

    h.auth.verify_email("a@x.com", &code).await.unwrap();

    let record = h.repo.find_by_email("a@x.com").await.unwrap().unwrap();
    assert!(record.is_verified);
    assert!(record.verification_code.is_none());

    assert!(matches!(
        h.auth.send_verification_code("a@x.com").await,
        Err(AuthError::AlreadyVerified)
    ));
}

#[tokio::test]
async fn test_verification_mismatch_keeps_code() {
    let h = harness();
    h.auth.register(registration("alice", "a@x.com")).await.unwrap();
    h.auth.send_verification_code("a@x.com").await.unwrap();
    let code = pending_code(&h, "a@x.com", CodePurpose::Verification)
        .await
        .unwrap();
    let wrong = if code == "999999" { "100000" } else { "999999" };

    let err = h.auth.verify_email("a@x.com", wrong).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    // The right code still works afterwards.
    h.auth.verify_email("a@x.com", &code).await.unwrap();
}

#[tokio::test]
async fn test_verification_code_expires_strictly_after_ttl() {
    let h = harness();
    h.auth.register(registration("alice", "a@x.com")).await.unwrap();
    h.auth.send_verification_code("a@x.com").await.unwrap();
    let code = pending_code(&h, "a@x.com", CodePurpose::Verification)
        .await
        .unwrap();

    h.clock.advance(Duration::seconds(180));
    h.auth.verify_email("a@x.com", &code).await.unwrap();
}

#[tokio::test]
async fn test_expired_verification_code() {
    let h = harness();
    h.auth.register(registration("alice", "a@x.com")).await.unwrap();
    h.auth.send_verification_code("a@x.com").await.unwrap();
    let code = pending_code(&h, "a@x.com", CodePurpose::Verification)
        .await
        .unwrap();

    h.clock.advance(Duration::seconds(181));
    let err = h.auth.verify_email("a@x.com", &code).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Expired);
    assert_eq!(err.to_string(), "Verification code has expired");
}

#[tokio::test]
async fn test_delivery_failure_invalidates_code() {
    let h = harness_with(RecordingMailer::failing());
    h.auth.register(registration("alice", "a@x.com")).await.unwrap();

    let err = h.auth.send_verification_code("a@x.com").await.unwrap_err();
    assert!(matches!(err, AuthError::Delivery(_)));
    assert_eq!(err.kind(), ErrorKind::DeliveryFailure);

    assert!(
        pending_code(&h, "a@x.com", CodePurpose::Verification)
            .await
            .is_none()
    );

    let err = h.auth.request_recovery_code("a@x.com").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeliveryFailure);
    assert!(
        pending_code(&h, "a@x.com", CodePurpose::Recovery)
            .await
            .is_none()
    );
}

#[tokio::test]
async fn test_expired_recovery_code_leaves_password_unchanged() {
    let h = harness();
    verified_user(&h, "alice", "a@x.com").await;

    h.auth.request_recovery_code("a@x.com").await.unwrap();
    let code = pending_code(&h, "a@x.com", CodePurpose::Recovery)
        .await
        .unwrap();

    h.clock.advance(Duration::seconds(181));

    let err = h
        .auth
        .reset_password(PasswordResetConfirm {
            email: "a@x.com".to_string(),
            verification_code: code,
            new_password: "brand-new-pass".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Expired);

    assert!(h.auth.login(login("a@x.com", "hunter22")).await.is_ok());
    assert!(matches!(
        h.auth.login(login("a@x.com", "brand-new-pass")).await,
        Err(AuthError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn test_recovery_resets_password() {
    let h = harness();
    verified_user(&h, "alice", "a@x.com").await;

    h.auth.request_recovery_code("a@x.com").await.unwrap();
    let code = pending_code(&h, "a@x.com", CodePurpose::Recovery)
        .await
        .unwrap();

    h.auth
        .reset_password(PasswordResetConfirm {
            email: "a@x.com".to_string(),
            verification_code: code.clone(),
            new_password: "brand-new-pass".to_string(),
        })
        .await
        .unwrap();

    assert!(h.auth.login(login("a@x.com", "brand-new-pass")).await.is_ok());
    assert!(
        pending_code(&h, "a@x.com", CodePurpose::Recovery)
            .await
            .is_none()
    );
}

#[tokio::test]
async fn test_wrong_recovery_code_is_rejected_before_any_change() {
    let h = harness();
    verified_user(&h, "alice", "a@x.com").await;

    let reset = |code: &str| PasswordResetConfirm {
        email: "a@x.com".to_string(),
        verification_code: code.to_string(),
        new_password: "brand-new-pass".to_string(),
    };

    let err = h.auth.reset_password(reset("123456")).await.unwrap_err();
    assert!(matches!(
        err,
        AuthError::Code {
            purpose: CodePurpose::Recovery,
            reason: CodeError::NotRequested,
        }
    ));

    h.auth.request_recovery_code("a@x.com").await.unwrap();
    let code = pending_code(&h, "a@x.com", CodePurpose::Recovery)
        .await
        .unwrap();
    let hash_before = h
        .repo
        .find_by_email("a@x.com")
        .await
        .unwrap()
        .unwrap()
        .password_hash;

    let err = h.auth.reset_password(reset("000000")).await.unwrap_err();
    assert!(matches!(
        err,
        AuthError::Code {
            purpose: CodePurpose::Recovery,
            reason: CodeError::Mismatch,
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Validation);

    let record = h.repo.find_by_email("a@x.com").await.unwrap().unwrap();
    assert_eq!(record.password_hash, hash_before);
    assert_eq!(
        pending_code(&h, "a@x.com", CodePurpose::Recovery).await,
        Some(code.clone())
    );

    h.auth.reset_password(reset(&code)).await.unwrap();
    assert!(h.auth.login(login("a@x.com", "brand-new-pass")).await.is_ok());
}

#[tokio::test]
async fn test_verification_code_cannot_be_spent_as_recovery() {
    let h = harness();
    h.auth.register(registration("alice", "a@x.com")).await.unwrap();
    h.auth.send_verification_code("a@x.com").await.unwrap();
    let code = pending_code(&h, "a@x.com", CodePurpose::Verification)
        .await
        .unwrap();

    let err = h
        .auth
        .reset_password(PasswordResetConfirm {
            email: "a@x.com".to_string(),
            verification_code: code,
            new_password: "brand-new-pass".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::Code {
            purpose: CodePurpose::Recovery,
            reason: CodeError::NotRequested,
        }
    ));
}

#[tokio::test]
async fn test_new_code_replaces_pending_one() {
    let h = harness();
    h.auth.register(registration("alice", "a@x.com")).await.unwrap();
    let record = h.repo.find_by_email("a@x.com").await.unwrap().unwrap();

    let first = h
        .auth
        .codes()
        .generate(record.id, CodePurpose::Verification)
        .await
        .unwrap();
    let second = h
        .auth
        .codes()
        .generate(record.id, CodePurpose::Verification)
        .await
        .unwrap();

    let pending = pending_code(&h, "a@x.com", CodePurpose::Verification)
        .await
        .unwrap();
    assert_eq!(pending, second.code);
    if first.code != second.code {
        assert!(
            h.auth
                .codes()
                .validate(record.id, &first.code, CodePurpose::Verification)
                .await
                .is_err()
        );
    }
}

#[tokio::test]
async fn test_logout_marks_offline() {
    let h = harness();
    verified_user(&h, "alice", "a@x.com").await;
    let (user, _) = h.auth.login(login("a@x.com", "hunter22")).await.unwrap();

    h.repo
        .update_fields(
            user.id,
            lets_talk::auth::UserUpdate::presence(UserStatus::Online, h.clock.now()),
        )
        .await
        .unwrap();

    h.clock.advance(Duration::minutes(5));
    h.auth.logout(user.id).await.unwrap();

    let record = h.repo.find_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(record.status, UserStatus::Offline);
    assert_eq!(record.last_seen, h.clock.now());
}

#[tokio::test]
async fn test_profile_update_and_password_change() {
    let h = harness();
    verified_user(&h, "alice", "a@x.com").await;
    let (user, _) = h.auth.login(login("a@x.com", "hunter22")).await.unwrap();

    let updated = h
        .auth
        .update_profile(
            user.id,
            ProfileUpdate {
                full_name: Some("Alice Liddell".to_string()),
                bio: Some("down the rabbit hole".to_string()),
                profile_picture: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.full_name, "Alice Liddell");
    assert_eq!(updated.bio, "down the rabbit hole");

    let wrong = h
        .auth
        .change_password(
            user.id,
            ChangePasswordRequest {
                current_password: "not-it".to_string(),
                new_password: "another-pass".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(wrong, AuthError::InvalidCurrentPassword));
    assert_eq!(wrong.status_code(), 400);

    h.auth
        .change_password(
            user.id,
            ChangePasswordRequest {
                current_password: "hunter22".to_string(),
                new_password: "another-pass".to_string(),
            },
        )
        .await
        .unwrap();
    assert!(h.auth.login(login("a@x.com", "another-pass")).await.is_ok());
}
