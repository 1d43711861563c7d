//! In-memory credential store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repository::UserRepository;
use crate::auth::{
    AuthError, AuthResult, NewUser, UserId, UserRecord, UserStatus, UserUpdate,
};

/// `UserRepository` backed by a `HashMap`, enforcing the same uniqueness
/// rules as the `users` table.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<UserId, UserRecord>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> AuthResult<Vec<UserRecord>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .filter(|u| u.email == email || u.username == username)
            .cloned()
            .collect())
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<UserRecord>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<UserRecord>> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn create_record(&self, user: NewUser) -> AuthResult<UserRecord> {
        let mut users = self.users.write().await;

        if users
            .values()
            .any(|u| u.email == user.email || u.username == user.username)
        {
            return Err(AuthError::UserExists);
        }

        let record = UserRecord {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            profile_picture: user.profile_picture,
            bio: String::new(),
            password_hash: user.password_hash,
            is_verified: false,
            status: UserStatus::Offline,
            last_seen: user.created_at,
            verification_code: None,
            recovery_code: None,
            created_at: user.created_at,
        };
        users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_fields(&self, user_id: UserId, update: UserUpdate) -> AuthResult<()> {
        let mut users = self.users.write().await;
        let record = users.get_mut(&user_id).ok_or(AuthError::UserNotFound)?;
        update.apply(record);
        Ok(())
    }

    async fn delete_by_id(&self, user_id: UserId) -> AuthResult<()> {
        self.users.write().await.remove(&user_id);
        Ok(())
    }
}
