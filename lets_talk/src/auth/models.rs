//! Authentication data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// User ID type
pub type UserId = Uuid;

/// Presence status persisted on the user record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Online,
    #[default]
    Offline,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Online => "online",
            UserStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(UserStatus::Online),
            "offline" => Ok(UserStatus::Offline),
            other => Err(format!("unknown user status: {other}")),
        }
    }
}

/// What a one-time code authorizes.
///
/// Each purpose has its own slot on the user record, so a verification code
/// can never be spent as a recovery code or the other way round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodePurpose {
    Verification,
    Recovery,
}

impl fmt::Display for CodePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodePurpose::Verification => f.write_str("verification"),
            CodePurpose::Recovery => f.write_str("recovery"),
        }
    }
}

/// A pending one-time code: the 6-digit string and the instant after which
/// it stops being accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneTimeCode {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Full credential record as held by the credential store.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub profile_picture: String,
    pub bio: String,
    pub password_hash: String,
    pub is_verified: bool,
    pub status: UserStatus,
    pub last_seen: DateTime<Utc>,
    pub verification_code: Option<OneTimeCode>,
    pub recovery_code: Option<OneTimeCode>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Pending code for the given purpose, if any.
    pub fn code(&self, purpose: CodePurpose) -> Option<&OneTimeCode> {
        match purpose {
            CodePurpose::Verification => self.verification_code.as_ref(),
            CodePurpose::Recovery => self.recovery_code.as_ref(),
        }
    }
}

/// Fields needed to create a user record
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub profile_picture: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Partial update of a user record.
///
/// `None` leaves a field untouched. The code slots are doubly optional:
/// `Some(None)` clears a pending code, `Some(Some(code))` replaces it.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub password_hash: Option<String>,
    pub is_verified: Option<bool>,
    pub status: Option<UserStatus>,
    pub last_seen: Option<DateTime<Utc>>,
    pub full_name: Option<String>,
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
    pub verification_code: Option<Option<OneTimeCode>>,
    pub recovery_code: Option<Option<OneTimeCode>>,
}

impl UserUpdate {
    /// Presence transition: new status plus `last_seen`.
    pub fn presence(status: UserStatus, at: DateTime<Utc>) -> Self {
        Self {
            status: Some(status),
            last_seen: Some(at),
            ..Self::default()
        }
    }

    /// Set or clear the code slot for `purpose`.
    pub fn with_code(mut self, purpose: CodePurpose, code: Option<OneTimeCode>) -> Self {
        match purpose {
            CodePurpose::Verification => self.verification_code = Some(code),
            CodePurpose::Recovery => self.recovery_code = Some(code),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.password_hash.is_none()
            && self.is_verified.is_none()
            && self.status.is_none()
            && self.last_seen.is_none()
            && self.full_name.is_none()
            && self.profile_picture.is_none()
            && self.bio.is_none()
            && self.verification_code.is_none()
            && self.recovery_code.is_none()
    }

    /// Apply the update to an in-memory record.
    pub fn apply(self, record: &mut UserRecord) {
        if let Some(hash) = self.password_hash {
            record.password_hash = hash;
        }
        if let Some(verified) = self.is_verified {
            record.is_verified = verified;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(last_seen) = self.last_seen {
            record.last_seen = last_seen;
        }
        if let Some(full_name) = self.full_name {
            record.full_name = full_name;
        }
        if let Some(picture) = self.profile_picture {
            record.profile_picture = picture;
        }
        if let Some(bio) = self.bio {
            record.bio = bio;
        }
        if let Some(code) = self.verification_code {
            record.verification_code = code;
        }
        if let Some(code) = self.recovery_code {
            record.recovery_code = code;
        }
    }
}

/// Public view of a user, safe to hand to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub profile_picture: String,
    pub bio: String,
    pub is_verified: bool,
    pub status: UserStatus,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<&UserRecord> for User {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username.clone(),
            email: record.email.clone(),
            full_name: record.full_name.clone(),
            profile_picture: record.profile_picture.clone(),
            bio: record.bio.clone(),
            is_verified: record.is_verified,
            status: record.status,
            last_seen: record.last_seen,
            created_at: record.created_at,
        }
    }
}

/// User registration request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub profile_picture: Option<String>,
}

/// User login request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request carrying only an email address (code issuance)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailRequest {
    pub email: String,
}

/// Email verification confirmation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub code: String,
}

/// Password reset confirmation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PasswordResetConfirm {
    pub email: String,
    pub verification_code: String,
    pub new_password: String,
}

/// Password change for an authenticated user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Editable profile fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
}

/// JWT claims for bearer tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: UserId, // User ID
    pub exp: i64,    // Expiration timestamp
    pub iat: i64,    // Issued at timestamp
}

/// A freshly issued bearer token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> UserRecord {
        let now = Utc::now();
        UserRecord {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            full_name: "Alice".to_string(),
            profile_picture: String::new(),
            bio: String::new(),
            password_hash: "hash".to_string(),
            is_verified: false,
            status: UserStatus::Offline,
            last_seen: now,
            verification_code: None,
            recovery_code: None,
            created_at: now,
        }
    }

    #[test]
    fn test_code_slots_are_separate() {
        let mut rec = record();
        let code = OneTimeCode {
            code: "123456".to_string(),
            expires_at: Utc::now(),
        };

        UserUpdate::default()
            .with_code(CodePurpose::Verification, Some(code.clone()))
            .apply(&mut rec);

        assert_eq!(rec.code(CodePurpose::Verification), Some(&code));
        assert!(rec.code(CodePurpose::Recovery).is_none());

        UserUpdate::default()
            .with_code(CodePurpose::Verification, None)
            .apply(&mut rec);
        assert!(rec.verification_code.is_none());
    }

    #[test]
    fn test_empty_update() {
        assert!(UserUpdate::default().is_empty());
        assert!(!UserUpdate::presence(UserStatus::Online, Utc::now()).is_empty());
        assert!(
            !UserUpdate::default()
                .with_code(CodePurpose::Recovery, None)
                .is_empty()
        );
    }

    #[test]
    fn test_status_round_trips_through_str() {
        assert_eq!("online".parse::<UserStatus>(), Ok(UserStatus::Online));
        assert_eq!(UserStatus::Offline.to_string(), "offline");
        assert!("away".parse::<UserStatus>().is_err());
    }

    #[test]
    fn test_register_request_accepts_camel_case() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{"username":"alice","email":"a@x.com","password":"secret1","fullName":"Alice"}"#,
        )
        .unwrap();
        assert_eq!(req.full_name, "Alice");
        assert!(req.profile_picture.is_none());

        // Missing fields become empty strings and are rejected by validation later.
        let partial: LoginRequest = serde_json::from_str(r#"{"email":"a@x.com"}"#).unwrap();
        assert!(partial.password.is_empty());
    }
}
