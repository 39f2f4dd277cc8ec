//! Whitelist of operations forwarded to the execution process.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A session operation that may be invoked across the process boundary.
///
/// The wire name (see [`Method::as_str`]) is the message name the request
/// travels under; responses come back on
/// [`response_name`](crate::constants::response_name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Method {
    GetLoggedOnUser,
    GetConversationsByIds,
    GetConversationItems,
    GetUsersById,
    GetUserById,
    GetFavoriteConversationIds,
    GetPresence,
    SubscribePresence,
    GetConversationById,
    AddTextItem,
    MakeCall,
    EndCall,
    Logout,
}

/// Error returned when parsing a name outside the whitelist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown method: {0}")]
pub struct UnknownMethod(pub String);

impl Method {
    /// Every forwardable operation.
    pub const ALL: [Method; 13] = [
        Method::GetLoggedOnUser,
        Method::GetConversationsByIds,
        Method::GetConversationItems,
        Method::GetUsersById,
        Method::GetUserById,
        Method::GetFavoriteConversationIds,
        Method::GetPresence,
        Method::SubscribePresence,
        Method::GetConversationById,
        Method::AddTextItem,
        Method::MakeCall,
        Method::EndCall,
        Method::Logout,
    ];

    /// The message name used on the channel.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::GetLoggedOnUser => "getLoggedOnUser",
            Method::GetConversationsByIds => "getConversationsByIds",
            Method::GetConversationItems => "getConversationItems",
            Method::GetUsersById => "getUsersById",
            Method::GetUserById => "getUserById",
            Method::GetFavoriteConversationIds => "getFavoriteConversationIds",
            Method::GetPresence => "getPresence",
            Method::SubscribePresence => "subscribePresence",
            Method::GetConversationById => "getConversationById",
            Method::AddTextItem => "addTextItem",
            Method::MakeCall => "makeCall",
            Method::EndCall => "endCall",
            Method::Logout => "logout",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}
