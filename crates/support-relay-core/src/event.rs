//! Outbound notifications produced by the hub.
//!
//! The hub never talks to sockets. It emits [`Envelope`]s on a channel and the
//! transport delivers them.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ClientId, ClientSummary, ConnectionId};

/// Why a control request did not (or no longer does) lead to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    #[error("Client is offline")]
    ClientOffline,
    #[error("Invalid access key")]
    InvalidAccessKey,
    #[error("User declined the request")]
    UserDeclined,
    #[error("Session already active")]
    AlreadyActive,
    #[error("A request for this client is already pending")]
    RequestPending,
    #[error("No pending request for this pair")]
    NoPendingRequest,
    #[error("Request timed out")]
    RequestTimedOut,
    #[error("Requester withdrew the request")]
    RequestWithdrawn,
    #[error("Requester disconnected")]
    RequesterDisconnected,
    #[error("Caller is not registered as this client")]
    NotRegistered,
    #[error("Directory unavailable")]
    Unavailable,
}

/// Mouse action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseEventKind {
    Move,
    Down,
    Up,
    Click,
    DoubleClick,
    Wheel,
}

/// Mouse button involved in an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    #[default]
    None,
    Left,
    Right,
    Middle,
}

/// A mouse event forwarded from support to client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseInput {
    pub x: i32,
    pub y: i32,
    pub event_type: MouseEventKind,
    #[serde(default)]
    pub button: MouseButton,
}

/// A keyboard event forwarded from support to client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardInput {
    pub key_code: u32,
    pub is_key_down: bool,
}

/// Notification emitted by the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    /// Reply to a registration attempt.
    RegistrationConfirmed {
        success: bool,
        timestamp: i64,
        message: Option<String>,
    },
    /// Admin broadcast: a client came online.
    ClientConnected { client: ClientSummary },
    /// Admin broadcast: a client went offline.
    ClientDisconnected { client_id: ClientId },
    /// Snapshot of online clients for an administrator.
    ClientList { clients: Vec<ClientSummary> },
    /// Prompt to a client: a support party wants control.
    ControlRequested {
        support_connection_id: ConnectionId,
        request_id: u64,
    },
    /// A prompt the client is showing is no longer valid.
    ControlRequestCancelled {
        support_connection_id: ConnectionId,
        reason: RejectReason,
    },
    /// To support: the client accepted.
    RemoteControlAccepted { client_id: ClientId },
    /// To client: local confirmation that the session is active.
    ControlSessionStarted { support_connection_id: ConnectionId },
    /// To support: the request failed or was declined.
    RemoteControlRejected {
        client_id: ClientId,
        reason: RejectReason,
    },
    /// To client: support ended the session.
    SupportStoppedControlling { support_connection_id: ConnectionId },
    /// To support: client ended the session.
    ClientStoppedBeingControlled { client_id: ClientId },
    /// Screen frame relayed to support.
    ScreenData { client_id: ClientId, data: Bytes },
    /// Mouse event relayed to client.
    Mouse(MouseInput),
    /// Keyboard event relayed to client.
    Keyboard(KeyboardInput),
    /// To support: the controlled client went away.
    PeerDisconnected { client_id: ClientId },
    /// To client: the controlling support connection went away.
    ControllerDisconnected { support_connection_id: ConnectionId },
    /// Generic operational failure reported to the caller.
    OperationFailed { operation: String, message: String },
}

impl HubEvent {
    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RegistrationConfirmed { .. } => "registration_confirmed",
            Self::ClientConnected { .. } => "client_connected",
            Self::ClientDisconnected { .. } => "client_disconnected",
            Self::ClientList { .. } => "client_list",
            Self::ControlRequested { .. } => "control_requested",
            Self::ControlRequestCancelled { .. } => "control_request_cancelled",
            Self::RemoteControlAccepted { .. } => "remote_control_accepted",
            Self::ControlSessionStarted { .. } => "control_session_started",
            Self::RemoteControlRejected { .. } => "remote_control_rejected",
            Self::SupportStoppedControlling { .. } => "support_stopped_controlling",
            Self::ClientStoppedBeingControlled { .. } => "client_stopped_being_controlled",
            Self::ScreenData { .. } => "receive_screen_data",
            Self::Mouse(_) => "receive_mouse_event",
            Self::Keyboard(_) => "receive_keyboard_event",
            Self::PeerDisconnected { .. } => "peer_disconnected",
            Self::ControllerDisconnected { .. } => "controller_disconnected",
            Self::OperationFailed { .. } => "operation_failed",
        }
    }
}

/// Who an event is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// A single transport connection.
    Connection(ConnectionId),
    /// Every connection in the admin group.
    Admins,
}

/// An addressed event, the unit the transport consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub to: Recipient,
    pub event: HubEvent,
}

impl Envelope {
    /// Address an event to one connection.
    #[must_use]
    pub const fn to_connection(conn: ConnectionId, event: HubEvent) -> Self {
        Self {
            to: Recipient::Connection(conn),
            event,
        }
    }

    /// Address an event to the admin group.
    #[must_use]
    pub const fn to_admins(event: HubEvent) -> Self {
        Self {
            to: Recipient::Admins,
            event,
        }
    }
}
