//! In-process broadcaster over per-connection channels.

use log::{debug, warn};
use std::{
    collections::{HashMap, HashSet},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};

use super::{Broadcaster, ConnectionId, events::ServerEvent};

/// Outbound queue depth per connection.
pub const CONNECTION_BUFFER: usize = 64;

#[derive(Default)]
struct HubState {
    senders: HashMap<ConnectionId, Sender<ServerEvent>>,
    rooms: HashMap<String, HashSet<ConnectionId>>,
}

/// Fan-out of [`ServerEvent`]s to registered connections
///
/// Each connection gets a bounded queue; the transport task drains the
/// matching [`Receiver`]. A full queue drops the event for that connection
/// only.
#[derive(Default)]
pub struct ConnectionHub {
    state: RwLock<HubState>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HubState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HubState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a live connection and return its outbound queue.
    pub fn register(&self, connection_id: ConnectionId) -> Receiver<ServerEvent> {
        let (tx, rx) = mpsc::channel(CONNECTION_BUFFER);
        self.write().senders.insert(connection_id, tx);
        rx
    }

    /// Drop a connection and its room memberships.
    pub fn unregister(&self, connection_id: ConnectionId) {
        let mut state = self.write();
        state.senders.remove(&connection_id);
        state.rooms.retain(|_, members| {
            members.remove(&connection_id);
            !members.is_empty()
        });
    }

    pub fn connection_count(&self) -> usize {
        self.read().senders.len()
    }

    pub fn room_members(&self, room: &str) -> Vec<ConnectionId> {
        self.read()
            .rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Emit to every member of `room`.
    pub fn emit_to_room(&self, room: &str, event: &ServerEvent) {
        let state = self.read();
        if let Some(members) = state.rooms.get(room) {
            for connection_id in members {
                if let Some(tx) = state.senders.get(connection_id) {
                    deliver(*connection_id, tx, event);
                }
            }
        }
    }
}

fn deliver(connection_id: ConnectionId, tx: &Sender<ServerEvent>, event: &ServerEvent) -> bool {
    match tx.try_send(event.clone()) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!("Outbound queue full for connection {connection_id}, dropping event");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!("Connection {connection_id} already closed");
            false
        }
    }
}

impl Broadcaster for ConnectionHub {
    fn broadcast(&self, event: &ServerEvent, exclude: Option<ConnectionId>) {
        let state = self.read();
        for (connection_id, tx) in &state.senders {
            if Some(*connection_id) != exclude {
                deliver(*connection_id, tx, event);
            }
        }
    }

    fn emit_to(&self, connection_id: ConnectionId, event: &ServerEvent) -> bool {
        match self.read().senders.get(&connection_id) {
            Some(tx) => deliver(connection_id, tx, event),
            None => false,
        }
    }

    fn join_room(&self, connection_id: ConnectionId, room: &str) {
        let mut state = self.write();
        if state.senders.contains_key(&connection_id) {
            state
                .rooms
                .entry(room.to_string())
                .or_default()
                .insert(connection_id);
        }
    }
}
