use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Call, ConnectionState, Item, OAuthConfig};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Body of a forwarded call: `{id, args}` sent under the method name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPayload {
    pub id: u64,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl RequestPayload {
    /// Extracts the request body from a message's argument list.
    pub fn from_args(payload: &[Value]) -> Result<Self, serde_json::Error> {
        Self::deserialize(payload.first().unwrap_or(&Value::Null))
    }
}

/// The logon instruction: `(oauthConfig, accessToken)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogonRequest {
    pub oauth: OAuthConfig,
    pub access_token: String,
}

impl LogonRequest {
    pub fn to_args(&self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(vec![
            serde_json::to_value(&self.oauth)?,
            Value::String(self.access_token.clone()),
        ])
    }

    pub fn from_args(payload: &[Value]) -> Result<Self, serde_json::Error> {
        let oauth = OAuthConfig::deserialize(payload.first().unwrap_or(&Value::Null))?;
        let access_token = String::deserialize(payload.get(1).unwrap_or(&Value::Null))?;
        Ok(Self {
            oauth,
            access_token,
        })
    }
}

// ---------------------------------------------------------------------------
// Event bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStateChangedEvent {
    pub state: ConnectionState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceChangedEvent {
    pub presence_state: crate::types::Presence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemEvent {
    pub item: Item,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEvent {
    pub call: Call,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadItemsData {
    pub conv_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationReadItemsEvent {
    pub data: ReadItemsData,
}
