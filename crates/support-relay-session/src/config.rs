//! Hub configuration.

use std::time::Duration;

/// Default time a client has to answer a control request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for a [`SessionHub`](crate::SessionHub).
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// How long a control request stays pending before it is withdrawn.
    pub request_timeout: Duration,
    /// Token required to join the admin group. `None` admits anyone.
    pub admin_token: Option<String>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            admin_token: None,
        }
    }
}

impl HubConfig {
    /// Override the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Require a token for the admin group.
    #[must_use]
    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(token.into());
        self
    }

    /// Check an admin token against the configured one.
    #[must_use]
    pub fn admits_admin(&self, token: Option<&str>) -> bool {
        match &self.admin_token {
            None => true,
            Some(expected) => token == Some(expected.as_str()),
        }
    }
}
