//! Application configuration: the OAuth client registered per domain.

use std::path::Path;

use serde::{Deserialize, Serialize};

use chattray_protocol::types::OAuthConfig;

use crate::SettingsError;

/// Shipped application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// One OAuth client per supported service domain. The first entry is
    /// the default domain.
    #[serde(default)]
    pub domains: Vec<OAuthConfig>,
    /// Log level handed to the session SDK in the execution process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk_log_level: Option<String>,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn default_domain(&self) -> Option<&str> {
        self.domains.first().map(|d| d.domain.as_str())
    }

    /// The OAuth client for `domain`.
    pub fn domain(&self, domain: &str) -> Result<&OAuthConfig, SettingsError> {
        self.domains
            .iter()
            .find(|d| d.domain == domain)
            .ok_or_else(|| SettingsError::UnknownDomain(domain.to_string()))
    }
}
