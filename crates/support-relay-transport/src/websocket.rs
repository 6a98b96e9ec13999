//! WebSocket transport for support and client endpoints.
//!
//! Each socket gets a fresh [`ConnectionId`]. Its messages are handled one at
//! a time, in order, and the hub's disconnect handling runs once after the
//! last one.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use support_relay_core::{ClientDirectory, ConnectionId, KeyboardInput, MouseInput};
use support_relay_session::SessionHub;
use tracing::{debug, info, warn};

use crate::{
    dispatch::Peers,
    protocol::{ClientMessage, ServerMessage},
};

/// WebSocket handler state.
pub struct RelayState<D>
where
    D: ClientDirectory,
{
    /// The session hub.
    pub hub: Arc<SessionHub<D>>,
    /// Live connections.
    pub peers: Arc<Peers>,
}

impl<D> Clone for RelayState<D>
where
    D: ClientDirectory,
{
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
            peers: Arc::clone(&self.peers),
        }
    }
}

impl<D> RelayState<D>
where
    D: ClientDirectory,
{
    /// Create new WebSocket state.
    #[must_use]
    pub const fn new(hub: Arc<SessionHub<D>>, peers: Arc<Peers>) -> Self {
        Self { hub, peers }
    }
}

/// WebSocket upgrade handler.
///
/// Use this as an Axum route handler.
pub async fn ws_handler<D>(
    ws: WebSocketUpgrade,
    State(state): State<RelayState<D>>,
) -> impl IntoResponse
where
    D: ClientDirectory + 'static,
{
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket<D>(socket: WebSocket, state: RelayState<D>)
where
    D: ClientDirectory + 'static,
{
    let (mut sender, mut receiver) = socket.split();
    let conn = ConnectionId::generate();
    let mut rx = state.peers.attach(conn.clone());

    info!("Connection {conn} opened (live connections: {})", state.peers.len());

    // Spawn task to forward messages to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    tracing::error!("Failed to serialize message: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    state.peers.send(
        &conn,
        ServerMessage::Connected {
            connection_id: conn.clone(),
        },
    );

    // Handle incoming messages
    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s.into(),
                Err(_) => continue,
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!("WebSocket error on {conn}: {e}");
                break;
            }
        };

        let client_msg: ClientMessage = match serde_json::from_str(&msg) {
            Ok(m) => m,
            Err(e) => {
                warn!("Invalid message from {conn}: {e}");
                state
                    .peers
                    .send(&conn, ServerMessage::error("parse", format!("Invalid message: {e}")));
                continue;
            }
        };

        handle_message(&state, &conn, client_msg).await;
    }

    state.peers.detach(&conn);
    state.hub.disconnect(&conn).await;
    send_task.abort();

    info!("Connection {conn} closed");
}

/// Apply one inbound message on behalf of `conn`.
///
/// Failures are reported back to `conn`; the connection stays usable.
pub async fn handle_message<D>(state: &RelayState<D>, conn: &ConnectionId, msg: ClientMessage)
where
    D: ClientDirectory,
{
    let hub = &state.hub;
    let operation = msg.operation();
    let screen = msg.decode_screen_data();

    match msg {
        ClientMessage::Ping => {
            state.peers.send(conn, ServerMessage::Pong);
        }
        ClientMessage::Register(request) => {
            if let Err(e) = hub.register(conn, request).await {
                debug!("{operation} from {conn} failed: {e}");
            }
        }
        ClientMessage::Unregister { client_id } => {
            hub.unregister(conn, &client_id).await;
        }
        ClientMessage::RequestControl {
            client_id,
            access_key,
        } => {
            if let Err(e) = hub.request_control(conn, &client_id, &access_key).await {
                debug!("{operation} from {conn} failed: {e}");
            }
        }
        ClientMessage::AcceptControl {
            client_id,
            support_connection_id,
        } => {
            if let Err(e) = hub.accept_control(conn, &client_id, &support_connection_id) {
                debug!("{operation} from {conn} failed: {e}");
            }
        }
        ClientMessage::RejectControl {
            client_id,
            support_connection_id,
        } => {
            if let Err(e) = hub.reject_control(conn, &client_id, &support_connection_id) {
                debug!("{operation} from {conn} failed: {e}");
            }
        }
        ClientMessage::StopControlling { client_id } => {
            hub.stop_controlling(conn, &client_id);
        }
        ClientMessage::StopBeingControlled {
            client_id,
            support_connection_id,
        } => {
            if let Err(e) = hub.stop_being_controlled(conn, &client_id, &support_connection_id) {
                debug!("{operation} from {conn} failed: {e}");
            }
        }
        ClientMessage::SendScreenData {
            client_id,
            target_connection_id,
            ..
        } => {
            let Some(data) = screen else {
                state
                    .peers
                    .send(conn, ServerMessage::error(operation, "Screen data is not valid base64"));
                return;
            };
            hub.relay_screen_data(conn, &client_id, &target_connection_id, data);
        }
        ClientMessage::SendMouseEvent {
            target_client_id,
            x,
            y,
            event_type,
            button,
        } => {
            hub.relay_mouse_event(
                conn,
                &target_client_id,
                MouseInput {
                    x,
                    y,
                    event_type,
                    button,
                },
            );
        }
        ClientMessage::SendKeyboardEvent {
            target_client_id,
            key_code,
            is_key_down,
        } => {
            hub.relay_keyboard_event(
                conn,
                &target_client_id,
                KeyboardInput {
                    key_code,
                    is_key_down,
                },
            );
        }
        ClientMessage::JoinAdmins { token } => {
            if hub.join_admins(conn, token.as_deref()) {
                state.peers.join_admins(conn);
            }
        }
        ClientMessage::ListClients => {
            if state.peers.is_admin(conn) {
                hub.list_clients(conn);
            } else {
                state
                    .peers
                    .send(conn, ServerMessage::error(operation, "Not an administrator"));
            }
        }
    }
}

#[derive(Serialize)]
struct Health {
    connections: usize,
    online_clients: usize,
    active_sessions: usize,
}

async fn health_handler<D>(State(state): State<RelayState<D>>) -> Json<Health>
where
    D: ClientDirectory + 'static,
{
    Json(Health {
        connections: state.peers.len(),
        online_clients: state.hub.registry().len(),
        active_sessions: state.hub.sessions().active_count(),
    })
}

/// Create the relay router: `/ws` for endpoints, `/health` for counters.
///
/// # Example
/// ```ignore
/// let app = Router::new()
///     .merge(create_ws_router(hub, peers));
/// ```
#[must_use]
pub fn create_ws_router<D>(hub: Arc<SessionHub<D>>, peers: Arc<Peers>) -> Router
where
    D: ClientDirectory + 'static,
{
    Router::new()
        .route("/ws", get(ws_handler::<D>))
        .route("/health", get(health_handler::<D>))
        .with_state(RelayState::new(hub, peers))
}
