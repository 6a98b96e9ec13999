//! Wire protocol for client-server communication.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use support_relay_core::{
    ClientId, ClientSummary, ConnectionId, HubEvent, KeyboardInput, MouseButton, MouseEventKind,
    MouseInput, RegistrationRequest, RejectReason,
};

/// Message from a client or support connection to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Register the connection as a controllable client.
    Register(RegistrationRequest),
    /// Take the client offline.
    Unregister { client_id: ClientId },
    /// Ask to control a client (the caller is the support party).
    RequestControl {
        client_id: ClientId,
        access_key: String,
    },
    /// Client accepts a pending request.
    AcceptControl {
        client_id: ClientId,
        support_connection_id: ConnectionId,
    },
    /// Client declines a pending request.
    RejectControl {
        client_id: ClientId,
        support_connection_id: ConnectionId,
    },
    /// Support ends its session (or withdraws its request).
    StopControlling { client_id: ClientId },
    /// Client ends the session controlling it.
    StopBeingControlled {
        client_id: ClientId,
        support_connection_id: ConnectionId,
    },
    /// Screen frame (base64 encoded) from client to support.
    SendScreenData {
        client_id: ClientId,
        target_connection_id: ConnectionId,
        data: String,
    },
    /// Mouse event from support to client.
    SendMouseEvent {
        target_client_id: ClientId,
        x: i32,
        y: i32,
        event_type: MouseEventKind,
        #[serde(default)]
        button: MouseButton,
    },
    /// Keyboard event from support to client.
    SendKeyboardEvent {
        target_client_id: ClientId,
        key_code: u32,
        is_key_down: bool,
    },
    /// Join the admin group.
    JoinAdmins {
        #[serde(default)]
        token: Option<String>,
    },
    /// Request the online client list (admins only).
    ListClients,
    /// Ping for keepalive.
    Ping,
}

impl ClientMessage {
    /// Create a screen data message from raw bytes.
    #[must_use]
    pub fn screen_data(client_id: ClientId, target_connection_id: ConnectionId, data: &[u8]) -> Self {
        Self::SendScreenData {
            client_id,
            target_connection_id,
            data: BASE64.encode(data),
        }
    }

    /// Decode screen data from base64.
    #[must_use]
    pub fn decode_screen_data(&self) -> Option<Bytes> {
        if let Self::SendScreenData { data, .. } = self {
            BASE64.decode(data).ok().map(Bytes::from)
        } else {
            None
        }
    }

    /// Operation name, as used in error replies.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Register(_) => "register",
            Self::Unregister { .. } => "unregister",
            Self::RequestControl { .. } => "request_control",
            Self::AcceptControl { .. } => "accept_control",
            Self::RejectControl { .. } => "reject_control",
            Self::StopControlling { .. } => "stop_controlling",
            Self::StopBeingControlled { .. } => "stop_being_controlled",
            Self::SendScreenData { .. } => "send_screen_data",
            Self::SendMouseEvent { .. } => "send_mouse_event",
            Self::SendKeyboardEvent { .. } => "send_keyboard_event",
            Self::JoinAdmins { .. } => "join_admins",
            Self::ListClients => "list_clients",
            Self::Ping => "ping",
        }
    }
}

/// Message from server to a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message on every connection: the identity the server assigned.
    Connected { connection_id: ConnectionId },
    RegistrationConfirmed {
        success: bool,
        timestamp: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    ClientConnected { client: ClientSummary },
    ClientDisconnected { client_id: ClientId },
    ClientList { clients: Vec<ClientSummary> },
    ControlRequested {
        support_connection_id: ConnectionId,
        request_id: u64,
    },
    ControlRequestCancelled {
        support_connection_id: ConnectionId,
        reason: RejectReason,
    },
    RemoteControlAccepted { client_id: ClientId },
    ControlSessionStarted { support_connection_id: ConnectionId },
    RemoteControlRejected {
        client_id: ClientId,
        reason: RejectReason,
        message: String,
    },
    SupportStoppedControlling { support_connection_id: ConnectionId },
    ClientStoppedBeingControlled { client_id: ClientId },
    /// Screen frame (base64 encoded).
    ReceiveScreenData { client_id: ClientId, data: String },
    ReceiveMouseEvent {
        x: i32,
        y: i32,
        event_type: MouseEventKind,
        button: MouseButton,
    },
    ReceiveKeyboardEvent { key_code: u32, is_key_down: bool },
    PeerDisconnected { client_id: ClientId },
    ControllerDisconnected { support_connection_id: ConnectionId },
    /// Error message.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operation: Option<String>,
        message: String,
    },
    /// Pong response.
    Pong,
}

impl ServerMessage {
    /// Create an error reply for an operation.
    #[must_use]
    pub fn error(operation: &str, message: impl Into<String>) -> Self {
        Self::Error {
            operation: Some(operation.to_string()),
            message: message.into(),
        }
    }

    /// Decode screen data from base64.
    #[must_use]
    pub fn decode_screen_data(&self) -> Option<Vec<u8>> {
        if let Self::ReceiveScreenData { data, .. } = self {
            BASE64.decode(data).ok()
        } else {
            None
        }
    }
}

impl From<HubEvent> for ServerMessage {
    fn from(event: HubEvent) -> Self {
        match event {
            HubEvent::RegistrationConfirmed {
                success,
                timestamp,
                message,
            } => Self::RegistrationConfirmed {
                success,
                timestamp,
                message,
            },
            HubEvent::ClientConnected { client } => Self::ClientConnected { client },
            HubEvent::ClientDisconnected { client_id } => Self::ClientDisconnected { client_id },
            HubEvent::ClientList { clients } => Self::ClientList { clients },
            HubEvent::ControlRequested {
                support_connection_id,
                request_id,
            } => Self::ControlRequested {
                support_connection_id,
                request_id,
            },
            HubEvent::ControlRequestCancelled {
                support_connection_id,
                reason,
            } => Self::ControlRequestCancelled {
                support_connection_id,
                reason,
            },
            HubEvent::RemoteControlAccepted { client_id } => {
                Self::RemoteControlAccepted { client_id }
            }
            HubEvent::ControlSessionStarted {
                support_connection_id,
            } => Self::ControlSessionStarted {
                support_connection_id,
            },
            HubEvent::RemoteControlRejected { client_id, reason } => Self::RemoteControlRejected {
                client_id,
                reason,
                message: reason.to_string(),
            },
            HubEvent::SupportStoppedControlling {
                support_connection_id,
            } => Self::SupportStoppedControlling {
                support_connection_id,
            },
            HubEvent::ClientStoppedBeingControlled { client_id } => {
                Self::ClientStoppedBeingControlled { client_id }
            }
            HubEvent::ScreenData { client_id, data } => Self::ReceiveScreenData {
                client_id,
                data: BASE64.encode(&data),
            },
            HubEvent::Mouse(MouseInput {
                x,
                y,
                event_type,
                button,
            }) => Self::ReceiveMouseEvent {
                x,
                y,
                event_type,
                button,
            },
            HubEvent::Keyboard(KeyboardInput {
                key_code,
                is_key_down,
            }) => Self::ReceiveKeyboardEvent {
                key_code,
                is_key_down,
            },
            HubEvent::PeerDisconnected { client_id } => Self::PeerDisconnected { client_id },
            HubEvent::ControllerDisconnected {
                support_connection_id,
            } => Self::ControllerDisconnected {
                support_connection_id,
            },
            HubEvent::OperationFailed { operation, message } => Self::Error {
                operation: Some(operation),
                message,
            },
        }
    }
}
