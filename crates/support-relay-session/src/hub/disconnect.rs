//! Connection teardown.

use support_relay_core::{ClientDirectory, ClientId, ConnectionId, Envelope, HubEvent, RejectReason};
use tracing::{error, info, warn};

use super::SessionHub;

impl<D> SessionHub<D>
where
    D: ClientDirectory,
{
    /// Remove every trace of a closed connection and notify counterparts.
    ///
    /// Call exactly once per connection, after its last message was handled.
    /// A connection that was both a registered client and a controlling
    /// support party is reconciled in both roles, client role first.
    pub async fn disconnect(&self, conn: &ConnectionId) {
        if let Some(client_id) = self.registry.unregister_connection(conn) {
            info!("Client {client_id} disconnected ({conn})");
            self.client_gone(&client_id).await;
        }
        self.support_gone(conn);
    }

    /// Clean up after a client identity left the registry.
    pub(super) async fn client_gone(&self, client_id: &ClientId) {
        let removed = self.sessions.remove_client(client_id);
        if let Some(support) = removed.session {
            info!("Ending session of {client_id} with {support}: client went offline");
            self.send_to(
                &support,
                HubEvent::PeerDisconnected {
                    client_id: client_id.clone(),
                },
            );
        }

        for support in removed.pending {
            self.send_to(
                &support,
                HubEvent::RemoteControlRejected {
                    client_id: client_id.clone(),
                    reason: RejectReason::ClientOffline,
                },
            );
        }

        self.emit(Envelope::to_admins(HubEvent::ClientDisconnected {
            client_id: client_id.clone(),
        }));

        // A client that re-registered meanwhile stays online.
        if self.registry.lookup(client_id).is_some() {
            return;
        }
        match self.directory.update_client_status(client_id, false).await {
            Ok(true) => {}
            Ok(false) => warn!("Directory has no record for {client_id}"),
            Err(e) => error!("Failed to mark {client_id} offline: {e}"),
        }
    }

    fn support_gone(&self, conn: &ConnectionId) {
        let removed = self.sessions.remove_support(conn);
        if let Some(client_id) = removed.session {
            info!("Ending session of {client_id} with {conn}: controller disconnected");
            if let Some(client_conn) = self.registry.lookup(&client_id) {
                self.send_to(
                    &client_conn,
                    HubEvent::ControllerDisconnected {
                        support_connection_id: conn.clone(),
                    },
                );
            }
        }

        for client_id in removed.pending {
            if let Some(client_conn) = self.registry.lookup(&client_id) {
                self.send_to(
                    &client_conn,
                    HubEvent::ControlRequestCancelled {
                        support_connection_id: conn.clone(),
                        reason: RejectReason::RequesterDisconnected,
                    },
                );
            }
        }
    }
}
