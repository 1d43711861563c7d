//! WebSocket handler for real-time presence.
//!
//! # Connection Flow
//!
//! 1. Client connects via `GET /ws` with its token in the `token` cookie,
//!    an `Authorization: Bearer` header, or a `?token=` query parameter
//! 2. Server validates the token and upgrades the connection
//! 3. Client announces itself with `joinUserRoom`
//! 4. Everyone else hears `userStatus: online`; on disconnect they hear
//!    `userStatus: offline` unless a newer connection took over
//!
//! # Frames
//!
//! Every frame is `{"event": <name>, "data": <payload>}`.
//!
//! Client to server:
//! - `joinUserRoom`: the user id owning this connection
//!
//! Server to client:
//! - `userStatus`: `{"userId", "status"}` for some other user
//! - `errorEvent`: `{"statusCode", "message", "success": false}`
//!
//! # Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:8000/ws?token=eyJhbGc...');
//! ws.onopen = () => ws.send(JSON.stringify({ event: 'joinUserRoom', data: me.id }));
//! ws.onmessage = (frame) => {
//!   const { event, data } = JSON.parse(frame.data);
//!   if (event === 'userStatus') updateContact(data.userId, data.status);
//! };
//! ```

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use lets_talk::{
    ConnectionId, ErrorKind, UserId,
    presence::{Broadcaster, ClientEvent, ErrorEvent, PresenceError, ServerEvent},
};
use log::{debug, error, info, warn};
use serde::Deserialize;

use super::{
    AppState,
    middleware::{authenticate_token, extract_token},
    rate_limiter::MessageLimiter,
};
use crate::{logging::log_security_event, metrics};

/// `errorEvent.statusCode` for rate-limited frames
const TOO_MANY_REQUESTS: u16 = 429;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// Authenticate, then upgrade to a WebSocket.
///
/// Returns `401 Unauthorized` without upgrading when the token is missing,
/// invalid, expired, or belongs to a deleted account.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let token = query.token.or_else(|| extract_token(&headers));

    let user_id = match authenticate_token(&state, token).await {
        Ok(user_id) => user_id,
        Err(e) => return e.into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, user_id, state))
}

async fn handle_socket(socket: WebSocket, user_id: UserId, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let connection_id = ConnectionId::new();

    let mut outbound = state.hub.register(connection_id);
    metrics::websocket_connections_total();
    metrics::websocket_connections_active(state.hub.connection_count());
    info!("WebSocket connected: connection={connection_id}, user={user_id}");

    let send_task = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize server event: {e}");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut limiter = MessageLimiter::new();

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_text(&state, &mut limiter, connection_id, user_id, text.as_str()).await;
            }
            Ok(Message::Close(_)) => {
                debug!("WebSocket close frame: connection={connection_id}");
                break;
            }
            Err(e) => {
                warn!("WebSocket error on connection {connection_id}: {e}");
                break;
            }
            _ => {}
        }
    }

    send_task.abort();
    state.hub.unregister(connection_id);

    if let Err(e) = state.presence.disconnect(connection_id).await {
        error!("Failed to record disconnect of connection {connection_id}: {e}");
    }

    metrics::websocket_connections_active(state.hub.connection_count());
    metrics::online_users(state.presence.registry().online_count());
    info!("WebSocket disconnected: connection={connection_id}, user={user_id}");
}

/// Process one inbound text frame.
///
/// Errors are reported back to the originating connection only, as an
/// `errorEvent`.
pub async fn handle_text(
    state: &AppState,
    limiter: &mut MessageLimiter,
    connection_id: ConnectionId,
    user_id: UserId,
    text: &str,
) {
    metrics::websocket_messages_received();

    if let Err(exceeded) = limiter.check() {
        warn!("Rate limit ({}) exceeded on connection {connection_id}", exceeded.label());
        metrics::rate_limit_hits_total(exceeded.label());
        let event = ServerEvent::Error(ErrorEvent {
            status_code: TOO_MANY_REQUESTS,
            message: exceeded.message().to_string(),
            success: false,
        });
        state.hub.emit_to(connection_id, &event);
        return;
    }

    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            debug!("Unparseable frame on connection {connection_id}: {e}");
            state.hub.emit_to(
                connection_id,
                &ServerEvent::error(ErrorKind::Validation, "Invalid message format"),
            );
            return;
        }
    };

    match event {
        ClientEvent::JoinUserRoom(announced) => {
            match state.presence.join(connection_id, user_id, &announced).await {
                Ok(_) => {
                    metrics::online_users(state.presence.registry().online_count());
                }
                Err(e) => {
                    if matches!(e, PresenceError::Forbidden) {
                        log_security_event(
                            "foreign_room_join",
                            Some(user_id),
                            &format!("Tried to join room {announced}"),
                        );
                    } else {
                        warn!("joinUserRoom failed on connection {connection_id}: {e}");
                    }
                    state.hub.emit_to(connection_id, &e.to_event());
                }
            }
        }
    }
}
