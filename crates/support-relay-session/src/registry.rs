//! Connection registry: client identity ⇄ connection identity.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use support_relay_core::{ClientId, ClientSummary, ConnectionId};

struct Entry {
    connection: ConnectionId,
    summary: ClientSummary,
}

#[derive(Default)]
struct Inner {
    by_client: HashMap<ClientId, Entry>,
    by_connection: HashMap<ConnectionId, ClientId>,
}

impl Inner {
    fn remove_client(&mut self, client_id: &ClientId) -> Option<ConnectionId> {
        let entry = self.by_client.remove(client_id)?;
        self.by_connection.remove(&entry.connection);
        Some(entry.connection)
    }

    fn remove_connection(&mut self, connection: &ConnectionId) -> Option<ClientId> {
        let client_id = self.by_connection.remove(connection)?;
        self.by_client.remove(&client_id);
        Some(client_id)
    }
}

/// What a registration replaced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registered {
    /// Connection previously registered under the same client identity.
    pub displaced_connection: Option<ConnectionId>,
    /// Client identity the connection was previously registered as.
    pub previous_client: Option<ClientId>,
}

/// Bidirectional registry of online clients.
///
/// Both directions live behind one lock, so every operation leaves the two
/// maps as exact mirrors of each other.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<Inner>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a client on a connection. Last writer wins.
    pub fn register(&self, summary: ClientSummary, connection: ConnectionId) -> Registered {
        let client_id = summary.client_id.clone();
        let mut inner = self.write();

        let displaced_connection = inner
            .remove_client(&client_id)
            .filter(|old| *old != connection);
        let previous_client = inner
            .remove_connection(&connection)
            .filter(|old| *old != client_id);

        inner
            .by_connection
            .insert(connection.clone(), client_id.clone());
        inner
            .by_client
            .insert(client_id, Entry { connection, summary });

        Registered {
            displaced_connection,
            previous_client,
        }
    }

    /// Remove a client. Idempotent.
    pub fn unregister(&self, client_id: &ClientId) -> Option<ConnectionId> {
        self.write().remove_client(client_id)
    }

    /// Remove a client only while it is still registered on `connection`.
    pub fn unregister_if(&self, client_id: &ClientId, connection: &ConnectionId) -> bool {
        let mut inner = self.write();
        let owned = inner
            .by_client
            .get(client_id)
            .is_some_and(|entry| entry.connection == *connection);
        if owned {
            inner.remove_client(client_id);
        }
        owned
    }

    /// Remove whatever client is registered on `connection`.
    pub fn unregister_connection(&self, connection: &ConnectionId) -> Option<ClientId> {
        self.write().remove_connection(connection)
    }

    /// Connection currently registered for a client.
    #[must_use]
    pub fn lookup(&self, client_id: &ClientId) -> Option<ConnectionId> {
        self.read()
            .by_client
            .get(client_id)
            .map(|entry| entry.connection.clone())
    }

    /// Client registered on a connection.
    #[must_use]
    pub fn reverse_lookup(&self, connection: &ConnectionId) -> Option<ClientId> {
        self.read().by_connection.get(connection).cloned()
    }

    /// Whether `connection` is the one currently registered for `client_id`.
    #[must_use]
    pub fn is_registered_on(&self, client_id: &ClientId, connection: &ConnectionId) -> bool {
        self.read()
            .by_client
            .get(client_id)
            .is_some_and(|entry| entry.connection == *connection)
    }

    /// Summaries of every online client, sorted by identity.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ClientSummary> {
        let mut clients: Vec<ClientSummary> = self
            .read()
            .by_client
            .values()
            .map(|entry| entry.summary.clone())
            .collect();
        clients.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        clients
    }

    /// Number of online clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().by_client.len()
    }

    /// Whether no client is online.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn assert_mirrored(&self) {
        let inner = self.read();
        assert_eq!(inner.by_client.len(), inner.by_connection.len());
        for (client_id, entry) in &inner.by_client {
            assert_eq!(inner.by_connection.get(&entry.connection), Some(client_id));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn summary(id: &str) -> ClientSummary {
        ClientSummary {
            client_id: ClientId::new(id),
            machine_name: None,
            username: None,
            os: None,
        }
    }

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::new(id)
    }

    #[test]
    fn test_register_and_lookup_both_directions() {
        let registry = ConnectionRegistry::new();
        let registered = registry.register(summary("C1"), conn("k1"));

        assert_eq!(registered, Registered::default());
        assert_eq!(registry.lookup(&ClientId::new("C1")), Some(conn("k1")));
        assert_eq!(registry.reverse_lookup(&conn("k1")), Some(ClientId::new("C1")));
        registry.assert_mirrored();
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = ConnectionRegistry::new();
        registry.register(summary("C1"), conn("k1"));
        let registered = registry.register(summary("C1"), conn("k2"));

        assert_eq!(registered.displaced_connection, Some(conn("k1")));
        assert_eq!(registry.lookup(&ClientId::new("C1")), Some(conn("k2")));
        assert_eq!(registry.reverse_lookup(&conn("k1")), None);
        assert_eq!(registry.len(), 1);
        registry.assert_mirrored();
    }

    #[test]
    fn test_connection_reregistering_under_new_identity() {
        let registry = ConnectionRegistry::new();
        registry.register(summary("C1"), conn("k1"));
        let registered = registry.register(summary("C2"), conn("k1"));

        assert_eq!(registered.previous_client, Some(ClientId::new("C1")));
        assert_eq!(registry.lookup(&ClientId::new("C1")), None);
        assert_eq!(registry.reverse_lookup(&conn("k1")), Some(ClientId::new("C2")));
        registry.assert_mirrored();
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        registry.register(summary("C1"), conn("k1"));

        assert_eq!(registry.unregister(&ClientId::new("C1")), Some(conn("k1")));
        assert_eq!(registry.unregister(&ClientId::new("C1")), None);
        assert!(registry.is_empty());
        registry.assert_mirrored();
    }

    #[test]
    fn test_unregister_if_ignores_other_connections() {
        let registry = ConnectionRegistry::new();
        registry.register(summary("C1"), conn("k2"));

        assert!(!registry.unregister_if(&ClientId::new("C1"), &conn("k1")));
        assert!(registry.is_registered_on(&ClientId::new("C1"), &conn("k2")));
        assert!(registry.unregister_if(&ClientId::new("C1"), &conn("k2")));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unregister_connection() {
        let registry = ConnectionRegistry::new();
        registry.register(summary("C1"), conn("k1"));

        assert_eq!(registry.unregister_connection(&conn("k1")), Some(ClientId::new("C1")));
        assert_eq!(registry.lookup(&ClientId::new("C1")), None);
        registry.assert_mirrored();
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let registry = ConnectionRegistry::new();
        registry.register(summary("b"), conn("k2"));
        registry.register(summary("a"), conn("k1"));

        let ids: Vec<_> = registry
            .snapshot()
            .into_iter()
            .map(|s| s.client_id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_concurrent_register_unregister_stays_mirrored() {
        let registry = Arc::new(ConnectionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let client = format!("C{}", i % 5);
                        let connection = conn(&format!("k{t}-{i}"));
                        if (i + t) % 3 == 0 {
                            registry.unregister(&ClientId::new(client.as_str()));
                        } else {
                            registry.register(summary(&client), connection);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        registry.assert_mirrored();
        assert!(registry.len() <= 5);
    }
}
