//! OAuth 2.0 authorization-code logon support.
//!
//! [`TokenManager`] owns the persisted token: it revalidates a stored
//! token against the service and falls back to an interactive
//! authorization-code flow when validation fails or no token exists.
//! The interactive window ([`AuthorizationPrompt`]) and the token service
//! ([`TokenEndpoint`]) are seams so the flow can run without a browser.

mod endpoint;
mod manager;
mod prompt;

pub use endpoint::{HttpTokenEndpoint, TokenEndpoint};
pub use manager::{TokenManager, TokenState};
pub use prompt::{AuthorizationGrant, AuthorizationPrompt, authorization_url};

use std::future::Future;
use std::pin::Pin;

use chattray_settings::SettingsError;

/// A boxed future returned by the OAuth seams.
pub type OAuthFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, OAuthError>> + Send + 'a>>;

/// Errors from token acquisition.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// The user closed the sign-in window without completing it.
    #[error("window was closed by user")]
    Dismissed,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token rejected by server (status {0})")]
    TokenRejected(u16),

    #[error("token exchange failed: {0}")]
    Exchange(String),

    #[error("authorization state mismatch")]
    StateMismatch,

    #[error("no persisted token")]
    NoToken,

    #[error("persisted token has no refresh token")]
    NoRefreshToken,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
}

impl OAuthError {
    /// Whether the user cancelled the interactive sign-in.
    pub fn is_dismissed(&self) -> bool {
        matches!(self, OAuthError::Dismissed)
    }
}

/// Source of access tokens for the session logon.
pub trait TokenProvider: Send + Sync {
    /// Returns a usable access token, prompting the user if needed.
    fn get_token(&self) -> OAuthFuture<'_, String>;

    /// Discards any persisted token.
    fn clear_token(&self) -> Result<(), OAuthError>;
}
