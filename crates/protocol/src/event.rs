//! Spontaneous session events relayed from the execution process.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Event types the execution process subscribes to and forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    ConnectionStateChanged,
    CallStatus,
    CallEnded,
    ItemAdded,
    ItemUpdated,
    UserPresenceChanged,
    ConversationReadItems,
}

/// Error returned when parsing a name outside the forwarded event set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event: {0}")]
pub struct UnknownEvent(pub String);

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::ConnectionStateChanged,
        EventKind::CallStatus,
        EventKind::CallEnded,
        EventKind::ItemAdded,
        EventKind::ItemUpdated,
        EventKind::UserPresenceChanged,
        EventKind::ConversationReadItems,
    ];

    /// The message name used on the channel.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::ConnectionStateChanged => "connectionStateChanged",
            EventKind::CallStatus => "callStatus",
            EventKind::CallEnded => "callEnded",
            EventKind::ItemAdded => "itemAdded",
            EventKind::ItemUpdated => "itemUpdated",
            EventKind::UserPresenceChanged => "userPresenceChanged",
            EventKind::ConversationReadItems => "conversationReadItems",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}

/// An event exactly as the session emitted it.
///
/// The payload is kept verbatim; consumers decode the fields they need
/// with [`ForwardedEvent::parse`].
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardedEvent {
    pub kind: EventKind,
    pub payload: serde_json::Value,
}

impl ForwardedEvent {
    pub fn new(kind: EventKind, payload: serde_json::Value) -> Self {
        Self { kind, payload }
    }

    /// Decodes the payload into a typed event body.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}
