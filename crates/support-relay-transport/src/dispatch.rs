//! Delivery of hub envelopes to live connections.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use support_relay_core::{ConnectionId, Envelope, Recipient};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info};

use crate::protocol::ServerMessage;

/// Outbound channels of every live connection, plus the admin group.
///
/// This is the transport's `sendTo`: messages for a connection that has
/// already gone are discarded.
#[derive(Default)]
pub struct Peers {
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>,
    admins: DashSet<ConnectionId>,
}

impl Peers {
    /// Create an empty peer set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a connection and return its outbound queue.
    #[must_use]
    pub fn attach(&self, conn: ConnectionId) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(conn, tx);
        rx
    }

    /// Forget a connection (and its admin membership).
    pub fn detach(&self, conn: &ConnectionId) {
        self.connections.remove(conn);
        self.admins.remove(conn);
    }

    /// Add a connection to the admin group.
    pub fn join_admins(&self, conn: &ConnectionId) {
        if self.connections.contains_key(conn) {
            self.admins.insert(conn.clone());
        }
    }

    /// Whether a connection is in the admin group.
    #[must_use]
    pub fn is_admin(&self, conn: &ConnectionId) -> bool {
        self.admins.contains(conn)
    }

    /// Number of live connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether there are no live connections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Send a message to one connection. Returns whether it was queued.
    pub fn send(&self, conn: &ConnectionId, msg: ServerMessage) -> bool {
        let Some(tx) = self.connections.get(conn) else {
            debug!("Discarding message for closed connection {conn}");
            return false;
        };
        tx.send(msg).is_ok()
    }

    /// Send a message to every admin. Returns how many received it.
    pub fn broadcast_admins(&self, msg: &ServerMessage) -> usize {
        let admins: Vec<ConnectionId> = self.admins.iter().map(|conn| conn.key().clone()).collect();
        admins
            .iter()
            .filter(|conn| self.send(conn, msg.clone()))
            .count()
    }

    /// Deliver one hub envelope.
    pub fn deliver(&self, envelope: Envelope) {
        let msg = ServerMessage::from(envelope.event);
        match envelope.to {
            Recipient::Connection(conn) => {
                self.send(&conn, msg);
            }
            Recipient::Admins => {
                self.broadcast_admins(&msg);
            }
        }
    }
}

/// Drain the hub's event channel into `peers` until the hub is dropped.
#[must_use]
pub fn spawn_dispatcher(
    peers: Arc<Peers>,
    mut events: mpsc::UnboundedReceiver<Envelope>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(envelope) = events.recv().await {
            peers.deliver(envelope);
        }
        info!("Hub event channel closed, dispatcher exiting");
    })
}

#[cfg(test)]
mod tests {
    use support_relay_core::{ClientId, HubEvent};

    use super::*;

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::new(id)
    }

    #[test]
    fn test_deliver_to_connection() {
        let peers = Peers::new();
        let mut rx = peers.attach(conn("S1"));

        peers.deliver(Envelope::to_connection(
            conn("S1"),
            HubEvent::PeerDisconnected {
                client_id: ClientId::new("C1"),
            },
        ));

        assert_eq!(
            rx.try_recv().unwrap(),
            ServerMessage::PeerDisconnected {
                client_id: ClientId::new("C1")
            }
        );
    }

    #[test]
    fn test_send_to_detached_connection_is_discarded() {
        let peers = Peers::new();
        let _rx = peers.attach(conn("S1"));
        peers.detach(&conn("S1"));

        assert!(!peers.send(&conn("S1"), ServerMessage::Pong));
        assert!(peers.is_empty());
    }

    #[test]
    fn test_admin_broadcast_reaches_members_only() {
        let peers = Peers::new();
        let mut admin = peers.attach(conn("A1"));
        let mut other = peers.attach(conn("k1"));
        peers.join_admins(&conn("A1"));
        peers.join_admins(&conn("ghost"));

        peers.deliver(Envelope::to_admins(HubEvent::ClientDisconnected {
            client_id: ClientId::new("C1"),
        }));

        assert!(admin.try_recv().is_ok());
        assert!(other.try_recv().is_err());
        assert!(!peers.is_admin(&conn("ghost")));

        peers.detach(&conn("A1"));
        assert!(!peers.is_admin(&conn("A1")));
    }

    #[tokio::test]
    async fn test_dispatcher_drains_until_sender_dropped() {
        let peers = Arc::new(Peers::new());
        let mut rx = peers.attach(conn("S1"));
        let (tx, events) = mpsc::unbounded_channel();
        let handle = spawn_dispatcher(Arc::clone(&peers), events);

        tx.send(Envelope::to_connection(
            conn("S1"),
            HubEvent::RemoteControlAccepted {
                client_id: ClientId::new("C1"),
            },
        ))
        .unwrap();
        drop(tx);

        tokio_test::assert_ok!(handle.await);
        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerMessage::RemoteControlAccepted { .. }
        ));
    }
}
