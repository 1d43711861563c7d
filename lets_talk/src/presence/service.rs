//! Connect / disconnect orchestration.

use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    Broadcaster, ConnectionId, PresenceError,
    events::ServerEvent,
    registry::{ConnectOutcome, DisconnectOutcome, PresenceRegistry},
};
use crate::{
    auth::{UserId, UserStatus, UserUpdate},
    clock::Clock,
    db::UserRepository,
};

/// Number of write locks the stored statuses are striped over.
const WRITE_STRIPES: usize = 64;

/// Drives the registry, the broadcasts and the persisted status together.
///
/// Broadcasts go out inside the registry's critical section, so every
/// connection hears a user's transitions in registry order. The store write
/// follows under a per-user write lock and records whatever the registry
/// says at that moment, so a slow write for an older transition can never
/// land after a newer one. A store failure is returned to the caller after
/// the in-memory state has already moved; the persisted status is then
/// stale until the next transition.
#[derive(Clone)]
pub struct PresenceService {
    registry: Arc<PresenceRegistry>,
    broadcaster: Arc<dyn Broadcaster>,
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
    write_locks: Arc<[Mutex<()>]>,
}

impl PresenceService {
    pub fn new(
        registry: Arc<PresenceRegistry>,
        broadcaster: Arc<dyn Broadcaster>,
        users: Arc<dyn UserRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            users,
            clock,
            write_locks: (0..WRITE_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn registry(&self) -> &Arc<PresenceRegistry> {
        &self.registry
    }

    /// Handle a `joinUserRoom` announcement from an authenticated connection.
    ///
    /// # Errors
    ///
    /// * `PresenceError::InvalidUserId` - Announced id does not parse
    /// * `PresenceError::Forbidden` - Announced id is not the connection's user
    /// * `PresenceError::Store` - Status could not be persisted
    pub async fn join(
        &self,
        connection_id: ConnectionId,
        authenticated: UserId,
        announced: &str,
    ) -> Result<ConnectOutcome, PresenceError> {
        let announced: UserId =
            Uuid::parse_str(announced.trim()).map_err(|_| PresenceError::InvalidUserId)?;

        if announced != authenticated {
            return Err(PresenceError::Forbidden);
        }

        self.connect(announced, connection_id).await
    }

    /// Mark `user_id` online on `connection_id`.
    ///
    /// Everyone except the originating connection hears `userStatus: online`.
    /// If the connection previously spoke for another user, that user goes
    /// offline first; a failure to store that is reported only after the new
    /// user's status has been written.
    pub async fn connect(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> Result<ConnectOutcome, PresenceError> {
        let outcome = self.registry.connect_with(user_id, connection_id, |outcome| {
            if let Some(released) = outcome.released {
                self.broadcaster.broadcast(
                    &ServerEvent::user_status(released, UserStatus::Offline),
                    None,
                );
            }
            self.broadcaster
                .join_room(connection_id, &user_id.to_string());
            self.broadcaster.broadcast(
                &ServerEvent::user_status(user_id, UserStatus::Online),
                Some(connection_id),
            );
        });

        if let Some(previous) = outcome.replaced {
            info!("User {user_id} moved from connection {previous} to {connection_id}");
        }

        let released_write = match outcome.released {
            Some(released) => {
                info!("Connection {connection_id} re-announced from {released} to {user_id}");
                let result = self.persist(released).await;
                if let Err(e) = &result {
                    warn!("Failed to store offline status of user {released}: {e}");
                }
                result
            }
            None => Ok(()),
        };

        self.persist(user_id).await?;
        released_write?;

        info!("User {user_id} online on connection {connection_id}");
        Ok(outcome)
    }

    /// Forget a closed connection.
    ///
    /// Only takes the user offline if this connection was still their
    /// authoritative one.
    pub async fn disconnect(
        &self,
        connection_id: ConnectionId,
    ) -> Result<DisconnectOutcome, PresenceError> {
        let outcome = self.registry.disconnect_with(connection_id, |outcome| {
            if let DisconnectOutcome::Offline { user_id } = outcome {
                self.broadcaster.broadcast(
                    &ServerEvent::user_status(*user_id, UserStatus::Offline),
                    Some(connection_id),
                );
            }
        });

        match outcome {
            DisconnectOutcome::Unknown => {
                debug!("Connection {connection_id} closed without joining a user room");
            }
            DisconnectOutcome::Superseded { user_id } => {
                info!(
                    "Connection {connection_id} closed, user {user_id} still online elsewhere"
                );
            }
            DisconnectOutcome::Offline { user_id } => {
                self.persist(user_id).await?;
                info!("User {user_id} offline");
            }
        }

        Ok(outcome)
    }

    /// Store the user's current registry status and `lastSeen`.
    async fn persist(&self, user_id: UserId) -> Result<(), PresenceError> {
        let stripe = (user_id.as_u128() % self.write_locks.len() as u128) as usize;
        let _guard = self.write_locks[stripe].lock().await;

        let status = if self.registry.is_online(user_id) {
            UserStatus::Online
        } else {
            UserStatus::Offline
        };
        self.users
            .update_fields(user_id, UserUpdate::presence(status, self.clock.now()))
            .await?;
        Ok(())
    }
}
