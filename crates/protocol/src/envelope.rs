use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error reported by the remote session, as carried in a response.
///
/// Session errors arrive in whatever shape the SDK produced them; a bare
/// string becomes the message, objects contribute their `code` and
/// `message` fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Builds an error from the loosely-typed value found on the wire.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::new(s.clone()),
            Value::Object(map) => {
                let code = map.get("code").and_then(|c| match c {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                });
                let message = map
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string());
                Self { code, message }
            }
            other => Self::new(other.to_string()),
        }
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{code}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Envelope for every message on the channel.
///
/// `name` selects the handler on the receiving side; `payload` is the
/// positional argument list the sender passed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payload: Vec<Value>,
}

impl Envelope {
    pub fn new(name: impl Into<String>, payload: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Builds the `(error|null, result)` argument list of a response.
    pub fn response_payload(result: Result<Value, RemoteError>) -> Vec<Value> {
        match result {
            Ok(data) => vec![Value::Null, data],
            // Serializing a plain struct into a Value cannot fail.
            Err(err) => vec![serde_json::to_value(err).unwrap_or(Value::Null)],
        }
    }

    /// Interprets a response argument list: a non-null first argument is
    /// the error, otherwise the second argument (or null) is the result.
    pub fn parse_response(payload: Vec<Value>) -> Result<Value, RemoteError> {
        let mut args = payload.into_iter();
        match args.next() {
            Some(Value::Null) | None => Ok(args.next().unwrap_or(Value::Null)),
            Some(err) => Err(RemoteError::from_value(&err)),
        }
    }
}
