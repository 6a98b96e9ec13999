//! Request / accept / reject / stop.

use std::{sync::Arc, time::Duration};

use support_relay_core::{
    ClientDirectory, ClientId, ConnectionId, Envelope, HubEvent, RejectReason,
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::{ControlError, SessionHub, emit_on};
use crate::{ConnectionRegistry, SessionTable};

impl<D> SessionHub<D>
where
    D: ClientDirectory,
{
    fn reject_request(
        &self,
        caller: &ConnectionId,
        client_id: &ClientId,
        reason: RejectReason,
    ) -> ControlError {
        warn!("Control request from {caller} for {client_id} rejected: {reason}");
        self.send_to(
            caller,
            HubEvent::RemoteControlRejected {
                client_id: client_id.clone(),
                reason,
            },
        );
        reason.into()
    }

    /// Ask a client to hand control to the caller.
    ///
    /// On success the client is prompted and the request stays pending until
    /// it is answered, withdrawn, or times out. Returns the request id.
    ///
    /// # Errors
    /// `ClientOffline`, `InvalidAccessKey`, `Unavailable`, `AlreadyActive` or
    /// `RequestPending`; the caller has been sent `RemoteControlRejected`.
    pub async fn request_control(
        &self,
        caller: &ConnectionId,
        client_id: &ClientId,
        access_key: &str,
    ) -> Result<u64, ControlError> {
        if self.registry.lookup(client_id).is_none() {
            return Err(self.reject_request(caller, client_id, RejectReason::ClientOffline));
        }

        match self.directory.validate_client(client_id, access_key).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(self.reject_request(caller, client_id, RejectReason::InvalidAccessKey));
            }
            Err(e) => {
                error!("Access key validation for {client_id} failed: {e}");
                return Err(self.reject_request(caller, client_id, RejectReason::Unavailable));
            }
        }

        let request_id = self
            .sessions
            .begin_request(client_id, caller)
            .map_err(|reason| self.reject_request(caller, client_id, reason))?;

        // The client may have gone away while the key was checked. Its teardown
        // drops pending entries after leaving the registry, so either it ran
        // before this entry existed or it will drop it and notify the caller.
        let Some(client_conn) = self.registry.lookup(client_id) else {
            if self.sessions.decline(client_id, caller).is_some() {
                return Err(self.reject_request(caller, client_id, RejectReason::ClientOffline));
            }
            return Err(RejectReason::ClientOffline.into());
        };

        info!("Control of {client_id} requested by {caller} (request {request_id})");
        self.send_to(
            &client_conn,
            HubEvent::ControlRequested {
                support_connection_id: caller.clone(),
                request_id,
            },
        );

        spawn_request_timeout(
            Arc::clone(&self.registry),
            Arc::clone(&self.sessions),
            self.events.clone(),
            PendingRequest {
                client_id: client_id.clone(),
                support: caller.clone(),
                request_id,
            },
            self.config.request_timeout,
        );

        Ok(request_id)
    }

    fn require_client(
        &self,
        caller: &ConnectionId,
        client_id: &ClientId,
        operation: &str,
    ) -> Result<(), ControlError> {
        if self.registry.is_registered_on(client_id, caller) {
            return Ok(());
        }
        warn!("{operation} for {client_id} from unregistered connection {caller}");
        self.fail(caller, operation, RejectReason::NotRegistered.to_string());
        Err(RejectReason::NotRegistered.into())
    }

    /// Client consents to being controlled by `support`.
    ///
    /// # Errors
    /// `NotRegistered`, `NoPendingRequest` or `AlreadyActive`; the caller has
    /// been sent `OperationFailed`.
    pub fn accept_control(
        &self,
        caller: &ConnectionId,
        client_id: &ClientId,
        support: &ConnectionId,
    ) -> Result<(), ControlError> {
        self.require_client(caller, client_id, "accept_control")?;

        let accepted = self.sessions.accept_then(client_id, support, || {
            self.send_to(
                support,
                HubEvent::RemoteControlAccepted {
                    client_id: client_id.clone(),
                },
            );
            self.send_to(
                caller,
                HubEvent::ControlSessionStarted {
                    support_connection_id: support.clone(),
                },
            );
        });
        if let Err(reason) = accepted {
            warn!("Accept of {support} by {client_id} failed: {reason}");
            self.fail(caller, "accept_control", reason.to_string());
            return Err(reason.into());
        }

        info!(
            "Session active: {client_id} controlled by {support} (active sessions: {})",
            self.sessions.active_count()
        );
        Ok(())
    }

    /// Client declines a pending request.
    ///
    /// # Errors
    /// `NotRegistered` or `NoPendingRequest`; the caller has been sent
    /// `OperationFailed`.
    pub fn reject_control(
        &self,
        caller: &ConnectionId,
        client_id: &ClientId,
        support: &ConnectionId,
    ) -> Result<(), ControlError> {
        self.require_client(caller, client_id, "reject_control")?;

        if self.sessions.decline(client_id, support).is_none() {
            let reason = RejectReason::NoPendingRequest;
            self.fail(caller, "reject_control", reason.to_string());
            return Err(reason.into());
        }

        info!("Client {client_id} declined control by {support}");
        self.send_to(
            support,
            HubEvent::RemoteControlRejected {
                client_id: client_id.clone(),
                reason: RejectReason::UserDeclined,
            },
        );
        Ok(())
    }

    /// Support ends its session with a client, or withdraws a pending request.
    ///
    /// Returns whether anything was ended. Stopping a session that is already
    /// gone is a no-op.
    pub fn stop_controlling(&self, caller: &ConnectionId, client_id: &ClientId) -> bool {
        if self.sessions.end(client_id, caller) {
            info!("Support {caller} stopped controlling {client_id}");
            if let Some(client_conn) = self.registry.lookup(client_id) {
                self.send_to(
                    &client_conn,
                    HubEvent::SupportStoppedControlling {
                        support_connection_id: caller.clone(),
                    },
                );
            }
            return true;
        }

        if self.sessions.decline(client_id, caller).is_some() {
            info!("Support {caller} withdrew its request for {client_id}");
            if let Some(client_conn) = self.registry.lookup(client_id) {
                self.send_to(
                    &client_conn,
                    HubEvent::ControlRequestCancelled {
                        support_connection_id: caller.clone(),
                        reason: RejectReason::RequestWithdrawn,
                    },
                );
            }
            return true;
        }

        info!("Stop from {caller} for {client_id}: no session");
        false
    }

    /// Client ends the session `support` holds on it.
    ///
    /// Returns whether a session was ended; a session that is already gone is
    /// a no-op.
    ///
    /// # Errors
    /// `NotRegistered` if the caller is not the client's connection.
    pub fn stop_being_controlled(
        &self,
        caller: &ConnectionId,
        client_id: &ClientId,
        support: &ConnectionId,
    ) -> Result<bool, ControlError> {
        self.require_client(caller, client_id, "stop_being_controlled")?;

        if !self.sessions.end(client_id, support) {
            info!("Stop from client {client_id} for {support}: no session");
            return Ok(false);
        }

        info!("Client {client_id} stopped being controlled by {support}");
        self.send_to(
            support,
            HubEvent::ClientStoppedBeingControlled {
                client_id: client_id.clone(),
            },
        );
        Ok(true)
    }
}

struct PendingRequest {
    client_id: ClientId,
    support: ConnectionId,
    request_id: u64,
}

fn spawn_request_timeout(
    registry: Arc<ConnectionRegistry>,
    sessions: Arc<SessionTable>,
    events: mpsc::UnboundedSender<Envelope>,
    request: PendingRequest,
    timeout: Duration,
) {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;

        let PendingRequest {
            client_id,
            support,
            request_id,
        } = request;

        if !sessions.expire(&client_id, &support, request_id) {
            return;
        }

        info!("Control request {request_id} from {support} for {client_id} timed out");
        // The client may have moved to another connection since it was prompted.
        let client_conn = registry.lookup(&client_id);
        emit_on(
            &events,
            Envelope::to_connection(
                support.clone(),
                HubEvent::RemoteControlRejected {
                    client_id,
                    reason: RejectReason::RequestTimedOut,
                },
            ),
        );
        if let Some(client_conn) = client_conn {
            emit_on(
                &events,
                Envelope::to_connection(
                    client_conn,
                    HubEvent::ControlRequestCancelled {
                        support_connection_id: support,
                        reason: RejectReason::RequestTimedOut,
                    },
                ),
            );
        }
    });
}
