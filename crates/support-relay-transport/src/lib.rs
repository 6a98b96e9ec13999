//! Transport layer for support and client endpoints.
//!
//! Provides:
//! - Wire protocol (JSON + base64 screen frames)
//! - Delivery of hub events to live connections
//! - WebSocket transport (feature: websocket)

pub mod dispatch;
pub mod protocol;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use dispatch::{Peers, spawn_dispatcher};
pub use protocol::{ClientMessage, ServerMessage};

#[cfg(feature = "websocket")]
pub use websocket::{RelayState, create_ws_router};
