//! In-memory client directory.

use std::{
    collections::HashMap,
    sync::RwLock,
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use support_relay_core::{ClientDirectory, ClientId, ClientRegistration, DirectoryError};

/// Stored directory record.
#[derive(Debug, Clone)]
pub struct ClientRecord {
    pub registration: ClientRegistration,
    pub online: bool,
    /// Last status change (Unix epoch seconds).
    pub updated_at: i64,
}

/// In-memory directory implementation.
///
/// Useful for development and single-process deployments.
/// Data is lost on restart.
pub struct MemoryDirectory {
    clients: RwLock<HashMap<ClientId, ClientRecord>>,
}

impl MemoryDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Look up a stored record.
    ///
    /// # Errors
    /// Returns error if the directory lock is poisoned.
    pub fn record(&self, client_id: &ClientId) -> Result<Option<ClientRecord>, DirectoryError> {
        Ok(self
            .clients
            .read()
            .map_err(|e| DirectoryError::Internal(e.to_string()))?
            .get(client_id)
            .cloned())
    }
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[async_trait]
impl ClientDirectory for MemoryDirectory {
    async fn upsert_client(&self, registration: &ClientRegistration) -> Result<(), DirectoryError> {
        let mut clients = self
            .clients
            .write()
            .map_err(|e| DirectoryError::Internal(e.to_string()))?;

        let online = clients
            .get(&registration.client_id)
            .is_some_and(|record| record.online);

        clients.insert(
            registration.client_id.clone(),
            ClientRecord {
                registration: registration.clone(),
                online,
                updated_at: now(),
            },
        );

        Ok(())
    }

    async fn validate_client(
        &self,
        client_id: &ClientId,
        access_key: &str,
    ) -> Result<bool, DirectoryError> {
        let clients = self
            .clients
            .read()
            .map_err(|e| DirectoryError::Internal(e.to_string()))?;

        Ok(clients
            .get(client_id)
            .is_some_and(|record| record.registration.access_key == access_key))
    }

    async fn update_client_status(
        &self,
        client_id: &ClientId,
        online: bool,
    ) -> Result<bool, DirectoryError> {
        let mut clients = self
            .clients
            .write()
            .map_err(|e| DirectoryError::Internal(e.to_string()))?;

        let Some(record) = clients.get_mut(client_id) else {
            return Ok(false);
        };

        record.online = online;
        record.updated_at = now();

        Ok(true)
    }
}
