//! Repository trait definitions for testability and dependency injection.
//!
//! This module provides trait-based abstractions over database operations,
//! enabling better testing through mock implementations and dependency injection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use uuid::Uuid;

use crate::auth::{AuthError, AuthResult, NewUser, OneTimeCode, UserId, UserRecord, UserUpdate};

/// Trait for credential store operations
///
/// Every write is a single statement, so an update either lands completely
/// or not at all.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// All records whose email or username matches (at most two).
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> AuthResult<Vec<UserRecord>>;

    /// Find user by (normalized) email
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<UserRecord>>;

    /// Find user by ID
    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<UserRecord>>;

    /// Insert a new, unverified record.
    ///
    /// Returns `AuthError::UserExists` on a unique violation.
    async fn create_record(&self, user: NewUser) -> AuthResult<UserRecord>;

    /// Apply a partial update.
    ///
    /// Returns `AuthError::UserNotFound` if no record has this ID.
    async fn update_fields(&self, user_id: UserId, update: UserUpdate) -> AuthResult<()>;

    /// Delete a record. Deleting a missing record is not an error.
    async fn delete_by_id(&self, user_id: UserId) -> AuthResult<()>;
}

const USER_COLUMNS: &str = "id, username, email, full_name, profile_picture, bio, password_hash,
     is_verified, status, last_seen, otp_code, otp_expires, password_reset_code,
     password_reset_expires, created_at";

/// Default PostgreSQL implementation of `UserRepository`
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn code_from_columns(
    code: Option<String>,
    expires_at: Option<DateTime<Utc>>,
) -> Option<OneTimeCode> {
    match (code, expires_at) {
        (Some(code), Some(expires_at)) => Some(OneTimeCode { code, expires_at }),
        _ => None,
    }
}

fn record_from_row(row: &PgRow) -> AuthResult<UserRecord> {
    let status: String = row.try_get("status")?;

    Ok(UserRecord {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        full_name: row.try_get("full_name")?,
        profile_picture: row.try_get("profile_picture")?,
        bio: row.try_get("bio")?,
        password_hash: row.try_get("password_hash")?,
        is_verified: row.try_get("is_verified")?,
        status: status.parse().map_err(AuthError::Internal)?,
        last_seen: row.try_get("last_seen")?,
        verification_code: code_from_columns(
            row.try_get("otp_code")?,
            row.try_get("otp_expires")?,
        ),
        recovery_code: code_from_columns(
            row.try_get("password_reset_code")?,
            row.try_get("password_reset_expires")?,
        ),
        created_at: row.try_get("created_at")?,
    })
}

fn map_unique_violation(err: sqlx::Error) -> AuthError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AuthError::UserExists,
        _ => AuthError::Database(err),
    }
}

/// Push a `(code, expires)` column pair onto an UPDATE.
fn push_code_pair(
    set: &mut sqlx::query_builder::Separated<'_, '_, Postgres, &'static str>,
    code_column: &'static str,
    expires_column: &'static str,
    code: Option<OneTimeCode>,
) {
    let (code, expires_at) = match code {
        Some(c) => (Some(c.code), Some(c.expires_at)),
        None => (None, None),
    };
    set.push(code_column).push_bind_unseparated(code);
    set.push(expires_column).push_bind_unseparated(expires_at);
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> AuthResult<Vec<UserRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 OR username = $2"
        ))
        .bind(email)
        .bind(username)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<UserRecord>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<UserRecord>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn create_record(&self, user: NewUser) -> AuthResult<UserRecord> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (id, username, email, full_name, profile_picture, password_hash,
                                last_seen, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.profile_picture)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        record_from_row(&row)
    }

    async fn update_fields(&self, user_id: UserId, update: UserUpdate) -> AuthResult<()> {
        if update.is_empty() {
            return match self.find_by_id(user_id).await? {
                Some(_) => Ok(()),
                None => Err(AuthError::UserNotFound),
            };
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
        {
            let mut set = builder.separated(", ");
            if let Some(hash) = update.password_hash {
                set.push("password_hash = ").push_bind_unseparated(hash);
            }
            if let Some(verified) = update.is_verified {
                set.push("is_verified = ").push_bind_unseparated(verified);
            }
            if let Some(status) = update.status {
                set.push("status = ").push_bind_unseparated(status.as_str());
            }
            if let Some(last_seen) = update.last_seen {
                set.push("last_seen = ").push_bind_unseparated(last_seen);
            }
            if let Some(full_name) = update.full_name {
                set.push("full_name = ").push_bind_unseparated(full_name);
            }
            if let Some(picture) = update.profile_picture {
                set.push("profile_picture = ").push_bind_unseparated(picture);
            }
            if let Some(bio) = update.bio {
                set.push("bio = ").push_bind_unseparated(bio);
            }
            if let Some(code) = update.verification_code {
                push_code_pair(&mut set, "otp_code = ", "otp_expires = ", code);
            }
            if let Some(code) = update.recovery_code {
                push_code_pair(
                    &mut set,
                    "password_reset_code = ",
                    "password_reset_expires = ",
                    code,
                );
            }
        }
        builder.push(" WHERE id = ").push_bind(user_id);

        let result = builder.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(AuthError::UserNotFound);
        }
        Ok(())
    }

    async fn delete_by_id(&self, user_id: UserId) -> AuthResult<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
