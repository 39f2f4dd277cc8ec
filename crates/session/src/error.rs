use std::time::Duration;

use chattray_channel::ChannelError;
use chattray_oauth::OAuthError;
use chattray_protocol::{Method, RemoteError};

/// Errors from the execution host.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("failed to start execution process: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("execution process has no {0} pipe")]
    MissingPipe(&'static str),

    #[error("execution process not ready after {0:?}")]
    ReadyTimeout(Duration),

    #[error("execution process exited before it was ready")]
    Exited,
}

/// Errors surfaced by the session proxy.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// No response arrived within the request timeout.
    #[error("timeout in {method} [{id}]")]
    Timeout { method: Method, id: u64 },

    /// The remote operation rejected.
    #[error("{method} failed: {error}")]
    Remote { method: Method, error: RemoteError },

    /// The execution window went away while a response was outstanding.
    #[error("execution window was closed")]
    SessionAbort,

    #[error(transparent)]
    Token(#[from] OAuthError),

    #[error("timeout in logon")]
    LogonTimeout,

    #[error("logon rejected: {0}")]
    LogonRejected(RemoteError),

    #[error("no session; call logon first")]
    NoSession,

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("host error: {0}")]
    Host(#[from] HostError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProxyError {
    /// Whether the logon loop should clear the token and try again.
    ///
    /// A user-dismissed sign-in and a destroyed window end the loop;
    /// every other failure is treated as a stale token.
    pub fn is_retryable_logon_failure(&self) -> bool {
        !matches!(
            self,
            ProxyError::Token(OAuthError::Dismissed) | ProxyError::SessionAbort
        )
    }
}
