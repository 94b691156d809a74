//! Google OpenID Connect dialect (authorization code flow, userinfo endpoint).

use super::{
    ExternalIdentity, OAuthProvider, ProviderKind, ensure_success, malformed, network_error,
};
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const SCOPE: &str = "openid email profile";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    name: Option<String>,
}

pub struct GoogleProvider {
    id: String,
    client_id: String,
    client_secret: String,
    authorize_url: String,
    token_url: String,
    userinfo_url: String,
    http: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(config: &ProviderConfig, http: reqwest::Client) -> Self {
        Self {
            id: config.id.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            authorize_url: config
                .authorize_url
                .clone()
                .unwrap_or_else(|| AUTHORIZE_URL.to_string()),
            token_url: config
                .token_url
                .clone()
                .unwrap_or_else(|| TOKEN_URL.to_string()),
            userinfo_url: config
                .api_url
                .clone()
                .unwrap_or_else(|| USERINFO_URL.to_string()),
            http,
        }
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn login_url(&self, csrf_token: &str, redirect_uri: &str) -> String {
        match Url::parse_with_params(
            &self.authorize_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", SCOPE),
                ("state", csrf_token),
            ],
        ) {
            Ok(url) => url.into(),
            Err(e) => {
                tracing::error!(provider = %self.id, error = %e, "invalid authorize_url");
                self.authorize_url.clone()
            }
        }
    }

    #[tracing::instrument(skip(self, code), fields(provider = %self.id))]
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<(ExternalIdentity, serde_json::Value), ProviderError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| network_error(&self.id, e))?;

        if response.status().is_client_error() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => ProviderError::Rejected {
                    provider: self.id.clone(),
                    error: err.error,
                    description: err.error_description,
                },
                Err(_) => ProviderError::Status {
                    provider: self.id.clone(),
                    status,
                    body,
                },
            });
        }
        let response = ensure_success(&self.id, response).await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| malformed(&self.id, format!("token response: {e}")))?;

        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| network_error(&self.id, e))?;
        let response = ensure_success(&self.id, response).await?;
        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| malformed(&self.id, format!("userinfo: {e}")))?;
        let info: UserInfo = serde_json::from_value(raw.clone())
            .map_err(|e| malformed(&self.id, format!("userinfo: {e}")))?;

        let email = info.email.unwrap_or_default();
        let identity = ExternalIdentity {
            provider: ProviderKind::Google,
            external_id: info.sub,
            display_name: info.name.unwrap_or_else(|| email.clone()),
            email,
        };
        Ok((identity, raw))
    }
}
