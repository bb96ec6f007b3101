use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::FlowId;

#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub authorization_url: Url,
    pub flow_id: FlowId,
    pub scope: String,
}

/// Query parameters the identity provider appends to the callback route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    pub fn from_url(callback_url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in callback_url.query_pairs() {
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    pub fn flow_id(&self) -> FlowId {
        FlowId::from(self.state.clone().unwrap_or_default())
    }
}

/// Normalized user record handed to the session store on success.
///
/// Accepts the backend's short field names (`id`, `name`, `avatar`) as well
/// as the camelCase names used on the message boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdentity {
    #[serde(alias = "id", deserialize_with = "string_or_number")]
    pub external_id: String,
    #[serde(alias = "name", default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(
        rename = "avatarURL",
        alias = "avatar",
        alias = "avatarUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub provider: String,
    #[serde(alias = "issued_at", default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<String>,
}

impl SessionIdentity {
    pub(crate) fn with_default_provider(mut self, provider: &str) -> Self {
        if self.provider.is_empty() {
            self.provider = provider.to_string();
        }
        self
    }
}

/// Backends disagree on whether user ids are strings or integers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(id) => id,
        RawId::Number(id) => id.to_string(),
    })
}

/// Payload crossing the popup/opener boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeMessage {
    #[serde(rename_all = "camelCase")]
    Success {
        flow_id: FlowId,
        identity: SessionIdentity,
    },
    #[serde(rename_all = "camelCase")]
    Failure {
        flow_id: FlowId,
        error_reason: String,
    },
}

impl OutcomeMessage {
    pub fn flow_id(&self) -> &FlowId {
        match self {
            OutcomeMessage::Success { flow_id, .. } | OutcomeMessage::Failure { flow_id, .. } => {
                flow_id
            }
        }
    }

    pub(crate) fn failure(flow_id: FlowId, reason: impl Into<String>) -> Self {
        OutcomeMessage::Failure {
            flow_id,
            error_reason: reason.into(),
        }
    }
}
