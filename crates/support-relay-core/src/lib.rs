//! Core types for brokering remote-control sessions.
//!
//! This crate provides the fundamental building blocks:
//! - `ClientId` / `ConnectionId` - Opaque identities for the two namespaces
//! - `ClientRegistration` - Validated registration record
//! - `HubEvent` / `Envelope` - Outbound notifications addressed to connections
//! - `ClientDirectory` - External directory trait (access keys, online status)

pub mod event;
pub mod ids;
pub mod registration;
pub mod traits;

pub use event::{
    Envelope, HubEvent, KeyboardInput, MouseButton, MouseEventKind, MouseInput, Recipient,
    RejectReason,
};
pub use ids::{ClientId, ConnectionId};
pub use registration::{ClientRegistration, ClientSummary, RegistrationError, RegistrationRequest};
pub use traits::{ClientDirectory, DirectoryError};
