//! Client registration record.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ClientId;

/// Maximum accepted length (in bytes) of any registration field.
pub const MAX_FIELD_LEN: usize = 256;

/// Registration payload as received from the wire.
///
/// Every field is optional here so that a malformed payload still
/// deserializes and can be rejected with a typed error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrationRequest {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub machine_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
}

/// Registration validation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Field {field} exceeds {max} bytes")]
    FieldTooLong { field: &'static str, max: usize },
}

/// A validated registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRegistration {
    pub client_id: ClientId,
    pub access_key: String,
    pub machine_name: Option<String>,
    pub username: Option<String>,
    pub os: Option<String>,
}

impl ClientRegistration {
    /// Public view of this registration (no access key).
    #[must_use]
    pub fn summary(&self) -> ClientSummary {
        ClientSummary {
            client_id: self.client_id.clone(),
            machine_name: self.machine_name.clone(),
            username: self.username.clone(),
            os: self.os.clone(),
        }
    }
}

impl TryFrom<RegistrationRequest> for ClientRegistration {
    type Error = RegistrationError;

    fn try_from(req: RegistrationRequest) -> Result<Self, Self::Error> {
        let client_id = required("client_id", req.client_id)?;
        let access_key = required("access_key", req.access_key)?;

        Ok(Self {
            client_id: ClientId::new(client_id),
            access_key,
            machine_name: optional("machine_name", req.machine_name)?,
            username: optional("username", req.username)?,
            os: optional("os", req.os)?,
        })
    }
}

fn required(field: &'static str, value: Option<String>) -> Result<String, RegistrationError> {
    optional(field, value)?.ok_or(RegistrationError::MissingField(field))
}

fn optional(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<String>, RegistrationError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.len() > MAX_FIELD_LEN {
        return Err(RegistrationError::FieldTooLong {
            field,
            max: MAX_FIELD_LEN,
        });
    }
    Ok(Some(trimmed.to_string()))
}

/// What administrators get to see about an online client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSummary {
    pub client_id: ClientId,
    pub machine_name: Option<String>,
    pub username: Option<String>,
    pub os: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(client_id: &str, access_key: &str) -> RegistrationRequest {
        RegistrationRequest {
            client_id: Some(client_id.to_string()),
            access_key: Some(access_key.to_string()),
            machine_name: Some("  WS-042 ".to_string()),
            username: Some(String::new()),
            os: None,
        }
    }

    #[test]
    fn test_valid_registration_normalizes_optional_fields() {
        let reg = ClientRegistration::try_from(request("C1", "K1")).unwrap();
        assert_eq!(reg.client_id, ClientId::new("C1"));
        assert_eq!(reg.access_key, "K1");
        assert_eq!(reg.machine_name.as_deref(), Some("WS-042"));
        assert_eq!(reg.username, None);
        assert_eq!(reg.os, None);
    }

    #[test]
    fn test_blank_required_field_is_missing() {
        let err = ClientRegistration::try_from(request("   ", "K1")).unwrap_err();
        assert_eq!(err, RegistrationError::MissingField("client_id"));

        let err = ClientRegistration::try_from(RegistrationRequest {
            client_id: Some("C1".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err, RegistrationError::MissingField("access_key"));
    }

    #[test]
    fn test_oversized_field_is_rejected() {
        let mut req = request("C1", "K1");
        req.os = Some("x".repeat(MAX_FIELD_LEN + 1));
        let err = ClientRegistration::try_from(req).unwrap_err();
        assert!(matches!(err, RegistrationError::FieldTooLong { field: "os", .. }));
    }

    #[test]
    fn test_summary_omits_access_key() {
        let reg = ClientRegistration::try_from(request("C1", "secret")).unwrap();
        let json = serde_json::to_string(&reg.summary()).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("WS-042"));
    }

    #[test]
    fn test_malformed_payload_still_deserializes() {
        let req: RegistrationRequest = serde_json::from_str(r#"{"machine_name":"box"}"#).unwrap();
        assert!(ClientRegistration::try_from(req).is_err());
    }
}
