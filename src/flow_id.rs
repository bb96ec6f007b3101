use std::fmt;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};

use crate::AuthError;

const FLOW_ID_BYTES: usize = 32;

/// Identifies one login attempt. Sent to the provider as the OAuth `state`
/// parameter, so the callback page can tag its outcome with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(String);

impl FlowId {
    pub fn generate() -> Result<Self, AuthError> {
        let mut bytes = [0u8; FLOW_ID_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|err| AuthError::OsRng {
                message: err.to_string(),
            })?;
        Ok(Self(URL_SAFE_NO_PAD.encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for FlowId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for FlowId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
