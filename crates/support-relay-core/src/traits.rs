//! External directory trait.

use async_trait::async_trait;
use thiserror::Error;

use crate::{ClientId, ClientRegistration};

/// Directory error.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Directory unavailable: {0}")]
    Unavailable(String),
    #[error("Directory error: {0}")]
    Internal(String),
}

/// Trait for the account directory backing the hub.
///
/// Implementations hold no hub state; every call is a single round trip and
/// the hub never holds a lock while awaiting one.
#[async_trait]
pub trait ClientDirectory: Send + Sync {
    /// Store (or refresh) a client's registration record.
    async fn upsert_client(&self, registration: &ClientRegistration) -> Result<(), DirectoryError>;

    /// Check an access key against the stored record.
    async fn validate_client(
        &self,
        client_id: &ClientId,
        access_key: &str,
    ) -> Result<bool, DirectoryError>;

    /// Record whether the client is online.
    ///
    /// Returns `false` when the directory has no record for the client.
    async fn update_client_status(
        &self,
        client_id: &ClientId,
        online: bool,
    ) -> Result<bool, DirectoryError>;
}
