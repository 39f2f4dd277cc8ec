use rand::Rng;
use rand::distributions::Alphanumeric;

use chattray_protocol::types::OAuthConfig;

use crate::{OAuthError, OAuthFuture};

/// What the authorization page redirected back with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationGrant {
    pub code: String,
    /// The `state` query parameter, when the redirect carried one.
    pub state: Option<String>,
}

/// Interactive sign-in window.
///
/// Implementations show `url`, wait for the browser to reach the redirect
/// URI and resolve with its query parameters. Closing the window resolves
/// with [`OAuthError::Dismissed`].
pub trait AuthorizationPrompt: Send + Sync {
    fn authorize(&self, url: &str) -> OAuthFuture<'_, AuthorizationGrant>;
}

/// Builds the authorization-code request URL.
pub fn authorization_url(config: &OAuthConfig, state: &str) -> Result<String, OAuthError> {
    let url = reqwest::Url::parse_with_params(
        &config.authorization_url(),
        &[
            ("response_type", "code"),
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("scope", config.scope()),
            ("state", state),
        ],
    )
    .map_err(|e| OAuthError::InvalidUrl(e.to_string()))?;
    Ok(url.into())
}

pub(crate) fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect()
}
