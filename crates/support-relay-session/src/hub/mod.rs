//! Session hub: the control protocol on top of the registry and session table.
//!
//! The hub never touches sockets. Every notification is an [`Envelope`] sent on
//! the channel returned by [`SessionHub::new`]; the transport drains it.
//! Directory calls are awaited with no table lock held.

mod control;
mod disconnect;
mod relay;


use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use support_relay_core::{
    ClientDirectory, ClientId, ClientRegistration, ConnectionId, DirectoryError, Envelope,
    HubEvent, RegistrationError, RegistrationRequest, RejectReason,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::{ConnectionRegistry, HubConfig, SessionTable};

/// Failure of a hub operation.
///
/// The hub has already told the caller about it by the time this is returned;
/// the error is for logging and for library callers.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Rejected(#[from] RejectReason),
    #[error("Invalid registration: {0}")]
    Registration(#[from] RegistrationError),
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),
}

/// Brokers control sessions between support connections and clients.
pub struct SessionHub<D>
where
    D: ClientDirectory,
{
    directory: D,
    config: HubConfig,
    registry: Arc<ConnectionRegistry>,
    sessions: Arc<SessionTable>,
    events: mpsc::UnboundedSender<Envelope>,
}

impl<D> SessionHub<D>
where
    D: ClientDirectory,
{
    /// Create a hub and the receiving end of its event channel.
    #[must_use]
    pub fn new(directory: D, config: HubConfig) -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (events, rx) = mpsc::unbounded_channel();
        let hub = Self {
            directory,
            config,
            registry: Arc::new(ConnectionRegistry::new()),
            sessions: Arc::new(SessionTable::new()),
            events,
        };
        (hub, rx)
    }

    /// Online clients.
    #[must_use]
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Pending requests and active sessions.
    #[must_use]
    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    fn emit(&self, envelope: Envelope) {
        emit_on(&self.events, envelope);
    }

    fn send_to(&self, conn: &ConnectionId, event: HubEvent) {
        self.emit(Envelope::to_connection(conn.clone(), event));
    }

    fn fail(&self, caller: &ConnectionId, operation: &str, message: impl Into<String>) {
        self.send_to(
            caller,
            HubEvent::OperationFailed {
                operation: operation.to_string(),
                message: message.into(),
            },
        );
    }

    fn confirm_registration(&self, caller: &ConnectionId, result: Result<(), String>) {
        let (success, message) = match result {
            Ok(()) => (true, None),
            Err(message) => (false, Some(message)),
        };
        self.send_to(
            caller,
            HubEvent::RegistrationConfirmed {
                success,
                timestamp: unix_timestamp(),
                message,
            },
        );
    }

    /// Register the caller as a client.
    ///
    /// The record is persisted and marked online before it enters the
    /// registry; if the directory fails, the registry is left untouched.
    ///
    /// # Errors
    /// Returns error if the payload is malformed or the directory fails.
    pub async fn register(
        &self,
        caller: &ConnectionId,
        request: RegistrationRequest,
    ) -> Result<(), ControlError> {
        let registration = match ClientRegistration::try_from(request) {
            Ok(registration) => registration,
            Err(e) => {
                warn!("Rejected registration from {caller}: {e}");
                self.confirm_registration(caller, Err(e.to_string()));
                return Err(e.into());
            }
        };
        let client_id = registration.client_id.clone();

        if let Err(e) = self.persist_online(&registration).await {
            error!("Failed to persist registration for {client_id}: {e}");
            self.confirm_registration(caller, Err("Registration is temporarily unavailable".into()));
            return Err(e.into());
        }

        let summary = registration.summary();
        let registered = self.registry.register(summary.clone(), caller.clone());

        if let Some(old) = &registered.displaced_connection {
            info!("Client {client_id} moved from connection {old} to {caller}");
        }
        if let Some(previous) = registered.previous_client {
            info!("Connection {caller} re-registered from {previous} to {client_id}");
            self.client_gone(&previous).await;
        }

        info!(
            "Client {client_id} registered on {caller} (online clients: {})",
            self.registry.len()
        );
        self.confirm_registration(caller, Ok(()));
        self.emit(Envelope::to_admins(HubEvent::ClientConnected { client: summary }));
        Ok(())
    }

    async fn persist_online(&self, registration: &ClientRegistration) -> Result<(), DirectoryError> {
        self.directory.upsert_client(registration).await?;
        if !self
            .directory
            .update_client_status(&registration.client_id, true)
            .await?
        {
            warn!(
                "Directory has no record for {} after upsert",
                registration.client_id
            );
        }
        Ok(())
    }

    /// Take a client offline.
    ///
    /// Only the connection the client is registered on may do this; anything
    /// else is a no-op, as is unregistering an absent client.
    pub async fn unregister(&self, caller: &ConnectionId, client_id: &ClientId) -> bool {
        if !self.registry.unregister_if(client_id, caller) {
            info!("Ignoring unregister of {client_id} from {caller}: not registered there");
            return false;
        }
        info!("Client {client_id} unregistered from {caller}");
        self.client_gone(client_id).await;
        true
    }

    /// Admit the caller to the admin group and send it the client list.
    ///
    /// Returns whether the caller was admitted; the transport tracks membership.
    pub fn join_admins(&self, caller: &ConnectionId, token: Option<&str>) -> bool {
        if !self.config.admits_admin(token) {
            warn!("Connection {caller} presented an invalid admin token");
            self.fail(caller, "join_admins", "Invalid admin token");
            return false;
        }
        info!("Connection {caller} joined the admin group");
        self.list_clients(caller);
        true
    }

    /// Send the caller a snapshot of online clients.
    pub fn list_clients(&self, caller: &ConnectionId) {
        self.send_to(
            caller,
            HubEvent::ClientList {
                clients: self.registry.snapshot(),
            },
        );
    }
}

fn emit_on(events: &mpsc::UnboundedSender<Envelope>, envelope: Envelope) {
    let name = envelope.event.name();
    if events.send(envelope).is_err() {
        warn!("Event channel closed, dropping {name}");
    }
}

fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
