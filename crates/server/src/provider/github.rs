//! GitHub OAuth App dialect.

use super::{
    ExternalIdentity, OAuthProvider, ProviderKind, ensure_success, malformed, network_error,
};
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const API_URL: &str = "https://api.github.com";
const SCOPE: &str = "read:user user:email";
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// GitHub answers token requests with HTTP 200 even on failure, so the body
/// carries either a token or an error.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: u64,
    login: String,
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

pub struct GitHubProvider {
    id: String,
    client_id: String,
    client_secret: String,
    authorize_url: String,
    token_url: String,
    api_url: String,
    http: reqwest::Client,
}

impl GitHubProvider {
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
            api_url: config
                .api_url
                .clone()
                .unwrap_or_else(|| API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            http,
        }
    }

    async fn access_token(&self, code: &str, redirect_uri: &str) -> Result<String, ProviderError> {
        let response = self
            .http
            .post(&self.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| network_error(&self.id, e))?;
        let response = ensure_success(&self.id, response).await?;

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| malformed(&self.id, format!("token response: {e}")))?;

        if let Some(error) = body.error {
            return Err(ProviderError::Rejected {
                provider: self.id.clone(),
                error,
                description: body.error_description,
            });
        }
        body.access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| malformed(&self.id, "token response has no access_token"))
    }

    async fn get_json(&self, path: &str, token: &str) -> Result<serde_json::Value, ProviderError> {
        let response = self
            .http
            .get(format!("{}{}", self.api_url, path))
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| network_error(&self.id, e))?;
        let response = ensure_success(&self.id, response).await?;
        response
            .json()
            .await
            .map_err(|e| malformed(&self.id, format!("{path}: {e}")))
    }

    /// Primary verified address, for accounts that keep their email private.
    async fn primary_email(&self, token: &str) -> Result<String, ProviderError> {
        let raw = self.get_json("/user/emails", token).await?;
        let emails: Vec<GitHubEmail> = serde_json::from_value(raw)
            .map_err(|e| malformed(&self.id, format!("/user/emails: {e}")))?;
        emails
            .into_iter()
            .find(|e| e.primary && e.verified)
            .map(|e| e.email)
            .ok_or_else(|| malformed(&self.id, "account has no primary verified email"))
    }
}

#[async_trait]
impl OAuthProvider for GitHubProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GitHub
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
        let token = self.access_token(code, redirect_uri).await?;
        let raw = self.get_json("/user", &token).await?;
        let user: GitHubUser = serde_json::from_value(raw.clone())
            .map_err(|e| malformed(&self.id, format!("/user: {e}")))?;

        let email = match user.email.filter(|e| !e.is_empty()) {
            Some(email) => email,
            None => self.primary_email(&token).await?,
        };

        let identity = ExternalIdentity {
            provider: ProviderKind::GitHub,
            external_id: user.id.to_string(),
            email,
            display_name: user.name.filter(|n| !n.is_empty()).unwrap_or(user.login),
        };
        tracing::debug!(external_id = %identity.external_id, "fetched GitHub profile");
        Ok((identity, raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GitHubProvider {
        GitHubProvider::new(
            &ProviderConfig {
                id: "github".into(),
                kind: ProviderKind::GitHub,
                client_id: "abc123".into(),
                client_secret: "shh".into(),
                authorize_url: None,
                token_url: None,
                api_url: None,
            },
            reqwest::Client::new(),
        )
    }

    #[test]
    fn login_url_carries_state_and_redirect() {
        let url = Url::parse(&provider().login_url(
            "csrf-value",
            "https://auth.example.com/oauth/callback/github/github",
        ))
        .unwrap();
        assert_eq!(url.host_str(), Some("github.com"));
        assert_eq!(url.path(), "/login/oauth/authorize");

        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "abc123");
        assert_eq!(pairs["state"], "csrf-value");
        assert_eq!(
            pairs["redirect_uri"],
            "https://auth.example.com/oauth/callback/github/github"
        );
        assert_eq!(pairs["scope"], SCOPE);
        assert!(!pairs.contains_key("client_secret"));
    }
}
