//! Session table: active control pairs and pending requests.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use support_relay_core::{ClientId, ConnectionId, RejectReason};

type Pair = (ClientId, ConnectionId);

#[derive(Default)]
struct Inner {
    by_client: HashMap<ClientId, ConnectionId>,
    by_support: HashMap<ConnectionId, ClientId>,
    pending: HashMap<Pair, u64>,
    next_request_id: u64,
}

impl Inner {
    fn is_busy(&self, client_id: &ClientId, support: &ConnectionId) -> bool {
        self.by_client.contains_key(client_id) || self.by_support.contains_key(support)
    }
}

/// What was removed for a party that went away.
#[derive(Debug, PartialEq, Eq)]
pub struct Teardown<T> {
    /// Counterpart of the active session, if there was one.
    pub session: Option<T>,
    /// Counterparts of the pending requests that were dropped.
    pub pending: Vec<T>,
}

/// Active sessions between clients and support connections.
///
/// Each session is stored in both directions. The two directions and the
/// pending-request set share one lock, so a reader never sees half a pair.
#[derive(Default)]
pub struct SessionTable {
    inner: Mutex<Inner>,
}

impl SessionTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a pending request and return its id.
    ///
    /// # Errors
    /// `AlreadyActive` if either party is already in a session,
    /// `RequestPending` if the same pair already has an open request.
    pub fn begin_request(
        &self,
        client_id: &ClientId,
        support: &ConnectionId,
    ) -> Result<u64, RejectReason> {
        let mut inner = self.lock();
        if inner.is_busy(client_id, support) {
            return Err(RejectReason::AlreadyActive);
        }
        let pair = (client_id.clone(), support.clone());
        if inner.pending.contains_key(&pair) {
            return Err(RejectReason::RequestPending);
        }
        inner.next_request_id += 1;
        let request_id = inner.next_request_id;
        inner.pending.insert(pair, request_id);
        Ok(request_id)
    }

    /// Turn a pending request into an active session.
    ///
    /// # Errors
    /// `AlreadyActive` if the pair (or either party) is already in a session,
    /// `NoPendingRequest` if there is nothing to accept.
    pub fn accept(&self, client_id: &ClientId, support: &ConnectionId) -> Result<(), RejectReason> {
        self.accept_then(client_id, support, || ())
    }

    /// Like [`accept`](Self::accept), running `on_active` before the lock is
    /// released.
    ///
    /// A teardown of either party that races the accept sees the session only
    /// after `on_active` has run.
    ///
    /// # Errors
    /// Same as [`accept`](Self::accept); `on_active` is not run.
    pub fn accept_then<R>(
        &self,
        client_id: &ClientId,
        support: &ConnectionId,
        on_active: impl FnOnce() -> R,
    ) -> Result<R, RejectReason> {
        let mut inner = self.lock();
        if inner.by_client.get(client_id) == Some(support) {
            return Err(RejectReason::AlreadyActive);
        }
        let pair = (client_id.clone(), support.clone());
        if inner.pending.remove(&pair).is_none() {
            return Err(RejectReason::NoPendingRequest);
        }
        if inner.is_busy(client_id, support) {
            return Err(RejectReason::AlreadyActive);
        }
        inner.by_client.insert(client_id.clone(), support.clone());
        inner.by_support.insert(support.clone(), client_id.clone());
        Ok(on_active())
    }

    /// Drop a pending request. Returns its id if one existed.
    pub fn decline(&self, client_id: &ClientId, support: &ConnectionId) -> Option<u64> {
        self.lock()
            .pending
            .remove(&(client_id.clone(), support.clone()))
    }

    /// Drop a pending request only if it is still the one identified by `request_id`.
    pub fn expire(&self, client_id: &ClientId, support: &ConnectionId, request_id: u64) -> bool {
        let mut inner = self.lock();
        let pair = (client_id.clone(), support.clone());
        if inner.pending.get(&pair) == Some(&request_id) {
            inner.pending.remove(&pair);
            true
        } else {
            false
        }
    }

    /// End the session between exactly these two parties.
    ///
    /// Returns `false` (and changes nothing) if they are not paired.
    pub fn end(&self, client_id: &ClientId, support: &ConnectionId) -> bool {
        let mut inner = self.lock();
        if inner.by_client.get(client_id) != Some(support) {
            return false;
        }
        inner.by_client.remove(client_id);
        inner.by_support.remove(support);
        true
    }

    /// Remove every trace of a client: its session and all requests addressed to it.
    ///
    /// Both happen under one lock, so no accept can slip in between.
    pub fn remove_client(&self, client_id: &ClientId) -> Teardown<ConnectionId> {
        let mut inner = self.lock();
        let session = inner.by_client.remove(client_id);
        if let Some(support) = &session {
            inner.by_support.remove(support);
        }
        let mut pending = Vec::new();
        inner.pending.retain(|(client, support), _| {
            if client == client_id {
                pending.push(support.clone());
                false
            } else {
                true
            }
        });
        Teardown { session, pending }
    }

    /// Remove every trace of a support connection: its session and all its requests.
    pub fn remove_support(&self, support: &ConnectionId) -> Teardown<ClientId> {
        let mut inner = self.lock();
        let session = inner.by_support.remove(support);
        if let Some(client_id) = &session {
            inner.by_client.remove(client_id);
        }
        let mut pending = Vec::new();
        inner.pending.retain(|(client, requester), _| {
            if requester == support {
                pending.push(client.clone());
                false
            } else {
                true
            }
        });
        Teardown { session, pending }
    }

    /// Support connection controlling a client.
    #[must_use]
    pub fn support_for(&self, client_id: &ClientId) -> Option<ConnectionId> {
        self.lock().by_client.get(client_id).cloned()
    }

    /// Client controlled by a support connection.
    #[must_use]
    pub fn client_for(&self, support: &ConnectionId) -> Option<ClientId> {
        self.lock().by_support.get(support).cloned()
    }

    /// Whether a request for this pair is awaiting an answer.
    #[must_use]
    pub fn is_pending(&self, client_id: &ClientId, support: &ConnectionId) -> bool {
        self.lock()
            .pending
            .contains_key(&(client_id.clone(), support.clone()))
    }

    /// Number of active sessions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.lock().by_client.len()
    }

    #[cfg(test)]
    pub(crate) fn assert_symmetric(&self) {
        let inner = self.lock();
        assert_eq!(inner.by_client.len(), inner.by_support.len());
        for (client_id, support) in &inner.by_client {
            assert_eq!(inner.by_support.get(support), Some(client_id));
        }
    }
}
