//! OAuth provider abstraction.
//!
//! Every upstream identity source implements [`OAuthProvider`]: it knows how to
//! build its authorization URL and how to turn an authorization code into an
//! [`ExternalIdentity`]. Providers are looked up by their configured id through
//! the [`ProviderRegistry`].

pub mod github;
pub mod google;

pub use github::GitHubProvider;
pub use google::GoogleProvider;

use crate::config::ProviderConfig;
use crate::error::{FlowError, ProviderError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use utoipa::ToSchema;

/// Known identity provider dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[serde(rename = "github")]
    GitHub,
    Google,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "github",
            ProviderKind::Google => "google",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(ProviderKind::GitHub),
            "google" => Ok(ProviderKind::Google),
            other => Err(format!("unknown provider kind: {other}")),
        }
    }
}

/// The user as reported by a provider after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub provider: ProviderKind,
    /// Provider-assigned user id
    pub external_id: String,
    pub email: String,
    pub display_name: String,
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Configured identifier, used in login and callback paths.
    fn id(&self) -> &str;

    /// Authorization-request URL the browser is sent to.
    fn login_url(&self, csrf_token: &str, redirect_uri: &str) -> String;

    /// Exchange an authorization code for the user's identity.
    ///
    /// Returns the raw profile payload alongside the normalized identity.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<(ExternalIdentity, serde_json::Value), ProviderError>;
}

/// Providers keyed by their configured id.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn OAuthProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one provider per configuration entry, sharing a single HTTP client.
    pub fn from_config(configs: &[ProviderConfig], http: reqwest::Client) -> Self {
        let mut registry = Self::new();
        for cfg in configs {
            let provider: Arc<dyn OAuthProvider> = match cfg.kind {
                ProviderKind::GitHub => Arc::new(GitHubProvider::new(cfg, http.clone())),
                ProviderKind::Google => Arc::new(GoogleProvider::new(cfg, http.clone())),
            };
            tracing::info!(id = %cfg.id, kind = %cfg.kind, "registered OAuth provider");
            registry.register(provider);
        }
        registry
    }

    /// Add a provider, replacing any previous one with the same id.
    pub fn register(&mut self, provider: Arc<dyn OAuthProvider>) {
        self.providers.insert(provider.id().to_string(), provider);
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn OAuthProvider>, FlowError> {
        self.providers
            .get(id)
            .cloned()
            .ok_or_else(|| FlowError::bad_request(format!("unknown provider: {id}")))
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

pub(crate) fn network_error(provider: &str, err: reqwest::Error) -> ProviderError {
    ProviderError::Network {
        provider: provider.to_string(),
        message: err.to_string(),
    }
}

pub(crate) fn malformed(provider: &str, message: impl Into<String>) -> ProviderError {
    ProviderError::Malformed {
        provider: provider.to_string(),
        message: message.into(),
    }
}

/// Turn a non-success response into a [`ProviderError::Status`].
pub(crate) async fn ensure_success(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status {
        provider: provider.to_string(),
        status,
        body,
    })
}
