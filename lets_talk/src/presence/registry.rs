//! Bidirectional user/connection map.
//!
//! Both directions live behind one mutex, so every connect and disconnect is
//! a single critical section and the "does the user still point at this
//! connection" check always sees a consistent snapshot.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use super::ConnectionId;
use crate::auth::UserId;

#[derive(Debug, Default)]
struct Maps {
    by_user: HashMap<UserId, ConnectionId>,
    by_connection: HashMap<ConnectionId, UserId>,
}

/// Result of [`PresenceRegistry::connect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub user_id: UserId,
    /// Connection that was authoritative for this user before, if any. It
    /// stays open but is no longer tracked as the user's connection.
    pub replaced: Option<ConnectionId>,
    /// Another user this connection was previously announced for, now left
    /// without a tracked connection.
    pub released: Option<UserId>,
}

/// Result of [`PresenceRegistry::disconnect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// The connection never announced a user.
    Unknown,
    /// The connection was authoritative for the user, who is now offline.
    Offline { user_id: UserId },
    /// A newer connection owns the user; presence is unchanged.
    Superseded { user_id: UserId },
}

/// In-memory presence registry
///
/// Tracks one connection per user, last writer wins.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    maps: Mutex<Maps>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Maps> {
        self.maps.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record `connection_id` as the live connection of `user_id`.
    pub fn connect(&self, user_id: UserId, connection_id: ConnectionId) -> ConnectOutcome {
        self.connect_with(user_id, connection_id, |_| {})
    }

    /// [`connect`](Self::connect), running `notify` before the lock is
    /// released.
    ///
    /// `notify` must not block or call back into the registry.
    pub fn connect_with(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
        notify: impl FnOnce(&ConnectOutcome),
    ) -> ConnectOutcome {
        let mut maps = self.lock();

        let released = maps
            .by_connection
            .insert(connection_id, user_id)
            .filter(|prev_user| {
                *prev_user != user_id && maps.by_user.get(prev_user) == Some(&connection_id)
            });
        if let Some(prev_user) = released {
            maps.by_user.remove(&prev_user);
        }

        let replaced = maps
            .by_user
            .insert(user_id, connection_id)
            .filter(|prev| *prev != connection_id);

        let outcome = ConnectOutcome {
            user_id,
            replaced,
            released,
        };
        notify(&outcome);
        outcome
    }

    /// Forget `connection_id`.
    ///
    /// The user is only reported offline if their forward mapping still
    /// points at this connection.
    pub fn disconnect(&self, connection_id: ConnectionId) -> DisconnectOutcome {
        self.disconnect_with(connection_id, |_| {})
    }

    /// [`disconnect`](Self::disconnect), running `notify` before the lock is
    /// released.
    pub fn disconnect_with(
        &self,
        connection_id: ConnectionId,
        notify: impl FnOnce(&DisconnectOutcome),
    ) -> DisconnectOutcome {
        let mut maps = self.lock();

        let outcome = match maps.by_connection.remove(&connection_id) {
            None => DisconnectOutcome::Unknown,
            Some(user_id) if maps.by_user.get(&user_id) == Some(&connection_id) => {
                maps.by_user.remove(&user_id);
                DisconnectOutcome::Offline { user_id }
            }
            Some(user_id) => DisconnectOutcome::Superseded { user_id },
        };
        notify(&outcome);
        outcome
    }

    /// Authoritative connection of a user.
    pub fn connection_of(&self, user_id: UserId) -> Option<ConnectionId> {
        self.lock().by_user.get(&user_id).copied()
    }

    /// User a connection announced, authoritative or not.
    pub fn user_of(&self, connection_id: ConnectionId) -> Option<UserId> {
        self.lock().by_connection.get(&connection_id).copied()
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.lock().by_user.contains_key(&user_id)
    }

    pub fn online_users(&self) -> Vec<UserId> {
        self.lock().by_user.keys().copied().collect()
    }

    /// Number of online users.
    pub fn online_count(&self) -> usize {
        self.lock().by_user.len()
    }
}
