//! Inbound signal parsing and shared-secret check.

use serde_json::Value;

use crate::error::SignalError;
use crate::models::{Action, Signal};

/// Payload fields accepted as the credential, in lookup order.
const CREDENTIAL_FIELDS: [&str; 2] = ["password", "credential"];

/// Turns raw webhook payloads into [`Signal`]s.
#[derive(Clone)]
pub struct SignalValidator {
    secret: Option<String>,
}

impl SignalValidator {
    pub fn new(secret: Option<String>) -> Self {
        // An empty secret would authorize everyone, treat it as "not configured".
        let secret = secret.filter(|s| !s.is_empty());
        Self { secret }
    }

    pub fn requires_credential(&self) -> bool {
        self.secret.is_some()
    }

    /// Validate a payload.
    ///
    /// # Errors
    /// `InvalidSignal` when `action` is missing or unsupported, `Unauthorized`
    /// when a secret is configured and the payload does not carry it.
    pub fn validate(&self, payload: &Value) -> Result<Signal, SignalError> {
        let action = payload
            .get("action")
            .and_then(Value::as_str)
            .and_then(Action::parse)
            .ok_or_else(SignalError::unsupported_action)?;

        if let Some(secret) = &self.secret {
            let presented = CREDENTIAL_FIELDS
                .iter()
                .find_map(|field| payload.get(*field).and_then(Value::as_str))
                .unwrap_or_default();
            if !secrets_match(presented.as_bytes(), secret.as_bytes()) {
                return Err(SignalError::Unauthorized);
            }
        }

        Ok(Signal::new(action))
    }
}

/// Equality that inspects every byte of equal-length inputs.
fn secrets_match(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
