use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use chattray_protocol::types::{OAuthConfig, OAuthToken};
use chattray_settings::Settings;

use crate::endpoint::{HttpTokenEndpoint, TokenEndpoint};
use crate::prompt::{AuthorizationPrompt, authorization_url, random_state};
use crate::{OAuthError, OAuthFuture, TokenProvider};

/// Where token acquisition currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    NoToken,
    AcquiringInteractive,
    HaveToken,
    Validating,
    Valid,
    Invalid,
}

/// Acquires, validates and persists the OAuth token for one domain.
pub struct TokenManager {
    config: OAuthConfig,
    settings: Settings,
    endpoint: Arc<dyn TokenEndpoint>,
    prompt: Arc<dyn AuthorizationPrompt>,
    state: Mutex<TokenState>,
}

impl TokenManager {
    pub fn new(
        config: OAuthConfig,
        settings: Settings,
        endpoint: Arc<dyn TokenEndpoint>,
        prompt: Arc<dyn AuthorizationPrompt>,
    ) -> Self {
        Self {
            config,
            settings,
            endpoint,
            prompt,
            state: Mutex::new(TokenState::NoToken),
        }
    }

    /// A manager talking HTTPS to the configured domain.
    pub fn with_http(
        config: OAuthConfig,
        settings: Settings,
        prompt: Arc<dyn AuthorizationPrompt>,
    ) -> Self {
        let endpoint = Arc::new(HttpTokenEndpoint::new(config.clone()));
        Self::new(config, settings, endpoint, prompt)
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub fn state(&self) -> TokenState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: TokenState) {
        let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != state {
            debug!(from = ?*current, to = ?state, "token state");
            *current = state;
        }
    }

    /// Returns a valid access token.
    ///
    /// A persisted token is validated first; if it is rejected (or the
    /// validation request fails) the interactive flow runs.
    pub async fn acquire(&self) -> Result<String, OAuthError> {
        match self.settings.token() {
            Some(token) => {
                self.set_state(TokenState::HaveToken);
                self.set_state(TokenState::Validating);
                match self.endpoint.validate(&token.access_token).await {
                    Ok(()) => {
                        self.set_state(TokenState::Valid);
                        return Ok(token.access_token);
                    }
                    Err(e) => {
                        warn!("persisted token is no longer valid: {e}");
                        self.set_state(TokenState::Invalid);
                    }
                }
            }
            None => self.set_state(TokenState::NoToken),
        }
        self.acquire_interactive().await
    }

    async fn acquire_interactive(&self) -> Result<String, OAuthError> {
        self.set_state(TokenState::AcquiringInteractive);
        let state = random_state();

        let result = async {
            let url = authorization_url(&self.config, &state)?;
            info!(domain = %self.config.domain, "requesting interactive sign-in");
            let grant = self.prompt.authorize(&url).await?;
            if grant.state.as_deref().is_some_and(|s| s != state) {
                return Err(OAuthError::StateMismatch);
            }
            let token = self.endpoint.exchange_code(&grant.code).await?;
            self.settings.set_token(&token)?;
            Ok::<_, OAuthError>(token.access_token)
        }
        .await;

        match result {
            Ok(access_token) => {
                self.set_state(TokenState::Valid);
                Ok(access_token)
            }
            Err(e) => {
                self.set_state(TokenState::NoToken);
                Err(e)
            }
        }
    }

    /// Discards the persisted token.
    pub fn clear(&self) -> Result<(), OAuthError> {
        self.settings.clear_token()?;
        self.set_state(TokenState::NoToken);
        Ok(())
    }

    /// Replaces the persisted token using its refresh token.
    ///
    /// The previous refresh token is kept when the service does not issue
    /// a new one.
    pub async fn refresh_token(&self) -> Result<OAuthToken, OAuthError> {
        let current = self.settings.token().ok_or(OAuthError::NoToken)?;
        let refresh = current.refresh_token.ok_or(OAuthError::NoRefreshToken)?;

        let mut token = self.endpoint.refresh(&refresh).await?;
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh);
        }
        self.settings.set_token(&token)?;
        self.set_state(TokenState::Valid);
        Ok(token)
    }
}

impl TokenProvider for TokenManager {
    fn get_token(&self) -> OAuthFuture<'_, String> {
        Box::pin(self.acquire())
    }

    fn clear_token(&self) -> Result<(), OAuthError> {
        self.clear()
    }
}
