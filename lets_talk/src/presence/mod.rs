//! Real-time presence: which users are connected right now.
//!
//! - [`PresenceRegistry`] holds the user/connection mapping
//! - [`Broadcaster`] is the transport seam (rooms, broadcast, direct emit)
//! - [`ConnectionHub`] implements it over in-process channels
//! - [`PresenceService`] ties the registry, broadcasts and persisted status

use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::{AuthError, ErrorKind};

pub mod events;
pub mod hub;
pub mod registry;
pub mod service;

pub use events::{ClientEvent, ErrorEvent, ServerEvent, UserStatusEvent};
pub use hub::ConnectionHub;
pub use registry::{ConnectOutcome, DisconnectOutcome, PresenceRegistry};
pub use service::PresenceService;

/// Identifier of one live real-time connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Real-time transport collaborator
pub trait Broadcaster: Send + Sync {
    /// Send to every connection except `exclude`.
    fn broadcast(&self, event: &ServerEvent, exclude: Option<ConnectionId>);

    /// Send to one connection. Returns `false` if it could not be queued.
    fn emit_to(&self, connection_id: ConnectionId, event: &ServerEvent) -> bool;

    /// Add a connection to a named room.
    fn join_room(&self, connection_id: ConnectionId, room: &str);
}

/// Presence errors
#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("Invalid user id")]
    InvalidUserId,

    #[error("Cannot join another user's room")]
    Forbidden,

    #[error(transparent)]
    Store(#[from] AuthError),
}

impl PresenceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PresenceError::InvalidUserId => ErrorKind::Validation,
            PresenceError::Forbidden => ErrorKind::Forbidden,
            PresenceError::Store(err) => err.kind(),
        }
    }

    pub fn to_event(&self) -> ServerEvent {
        let message = match self {
            PresenceError::Store(err) => err.client_message(),
            other => other.to_string(),
        };
        ServerEvent::error(self.kind(), message)
    }
}
