//! Token service access.

use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use chattray_protocol::types::{OAuthConfig, OAuthToken};

use crate::{OAuthError, OAuthFuture};

/// The service's token endpoint.
pub trait TokenEndpoint: Send + Sync {
    /// Succeeds when the service still accepts `access_token`.
    fn validate(&self, access_token: &str) -> OAuthFuture<'_, ()>;

    /// Exchanges an authorization code for a token.
    fn exchange_code(&self, code: &str) -> OAuthFuture<'_, OAuthToken>;

    /// Obtains a new token with a refresh token.
    fn refresh(&self, refresh_token: &str) -> OAuthFuture<'_, OAuthToken>;
}

/// Token endpoint response body.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenResponse {
    fn into_token(self) -> Result<OAuthToken, OAuthError> {
        match self.access_token.filter(|t| !t.is_empty()) {
            Some(access_token) => Ok(OAuthToken {
                access_token,
                refresh_token: self.refresh_token,
                expiry: self
                    .expires_in
                    .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
            }),
            None => Err(OAuthError::Exchange(
                self.error_description
                    .or(self.error)
                    .unwrap_or_else(|| "missing access_token".into()),
            )),
        }
    }
}

/// [`TokenEndpoint`] talking HTTPS to `https://{domain}/oauth/token`.
pub struct HttpTokenEndpoint {
    client: reqwest::Client,
    config: OAuthConfig,
}

impl HttpTokenEndpoint {
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn post_form(&self, form: &[(&str, &str)]) -> Result<OAuthToken, OAuthError> {
        let resp = self
            .client
            .post(self.config.token_url())
            .form(form)
            .send()
            .await?;
        let status = resp.status();
        let body: TokenResponse = resp.json().await?;
        if !status.is_success() && body.error.is_none() {
            return Err(OAuthError::Exchange(format!("HTTP {}", status.as_u16())));
        }
        body.into_token()
    }
}

impl TokenEndpoint for HttpTokenEndpoint {
    fn validate(&self, access_token: &str) -> OAuthFuture<'_, ()> {
        let url = format!("{}/{access_token}", self.config.token_url());
        Box::pin(async move {
            let resp = self.client.get(url).send().await?;
            let status = resp.status();
            debug!(status = status.as_u16(), "token validation response");
            if status.is_success() {
                Ok(())
            } else {
                Err(OAuthError::TokenRejected(status.as_u16()))
            }
        })
    }

    fn exchange_code(&self, code: &str) -> OAuthFuture<'_, OAuthToken> {
        let code = code.to_string();
        Box::pin(async move {
            self.post_form(&[
                ("grant_type", "authorization_code"),
                ("code", &code),
                ("client_id", &self.config.client_id),
                ("client_secret", &self.config.client_secret),
                ("redirect_uri", &self.config.redirect_uri),
            ])
            .await
        })
    }

    fn refresh(&self, refresh_token: &str) -> OAuthFuture<'_, OAuthToken> {
        let refresh_token = refresh_token.to_string();
        Box::pin(async move {
            self.post_form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", &refresh_token),
                ("client_id", &self.config.client_id),
                ("client_secret", &self.config.client_secret),
            ])
            .await
        })
    }
}
