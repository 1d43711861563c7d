//! Payloads carried over the real-time channel.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};

use crate::auth::{AuthError, ErrorKind, UserId, UserStatus};

/// `userStatus` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatusEvent {
    pub user_id: UserId,
    pub status: UserStatus,
}

/// `errorEvent` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    pub status_code: u16,
    pub message: String,
    pub success: bool,
}

impl ErrorEvent {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status_code: kind.status_code(),
            message: message.into(),
            success: false,
        }
    }
}

impl From<&AuthError> for ErrorEvent {
    fn from(err: &AuthError) -> Self {
        Self::new(err.kind(), err.client_message())
    }
}

/// Frames pushed from the server to a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "userStatus")]
    UserStatus(UserStatusEvent),

    #[serde(rename = "errorEvent")]
    Error(ErrorEvent),
}

impl ServerEvent {
    pub fn user_status(user_id: UserId, status: UserStatus) -> Self {
        ServerEvent::UserStatus(UserStatusEvent { user_id, status })
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorEvent::new(kind, message))
    }
}

/// Frames sent by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Announce the user that owns this connection.
    #[serde(rename = "joinUserRoom")]
    JoinUserRoom(String),
}
