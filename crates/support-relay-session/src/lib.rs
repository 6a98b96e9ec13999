//! Session relay core for remote support.
//!
//! Provides:
//! - `ConnectionRegistry` - Online clients and the connection each one is on
//! - `SessionTable` - Pending requests and active control sessions
//! - `SessionHub` - Control protocol, event relay and disconnect handling
//! - Directory implementations (memory)

pub mod config;
pub mod directory;
pub mod hub;
pub mod registry;
pub mod table;

pub use config::HubConfig;
pub use hub::{ControlError, SessionHub};
pub use registry::ConnectionRegistry;
pub use table::{SessionTable, Teardown};
