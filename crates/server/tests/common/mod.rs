//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use federated_login::AppResources;
use federated_login::account::{AccountStore, MemoryAccountStore, Reconciler};
use federated_login::config::{AppConfig, ProviderConfig, TokenConfig};
use federated_login::error::ProviderError;
use federated_login::flow::FlowController;
use federated_login::provider::{ExternalIdentity, OAuthProvider, ProviderKind, ProviderRegistry};
use federated_login::session::{FlowSessionStore, MemorySessionStore};
use federated_login::token::TokenEngine;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub const SIGNING_PRIVATE: &str = include_str!("../fixtures/signing_private.pem");
pub const SIGNING_PUBLIC: &str = include_str!("../fixtures/signing_public.pem");
pub const OTHER_PRIVATE: &str = include_str!("../fixtures/other_private.pem");
pub const OTHER_PUBLIC: &str = include_str!("../fixtures/other_public.pem");

pub const APP_URL: &str = "https://auth.example.com";
pub const ALLOWED_RETURN: &str = "https://app.example.com";

pub fn token_config() -> TokenConfig {
    TokenConfig {
        private_key: SIGNING_PRIVATE.to_string(),
        public_key: SIGNING_PUBLIC.to_string(),
        valid_duration_secs: 3600,
    }
}

pub fn token_engine() -> TokenEngine {
    TokenEngine::new(&token_config(), APP_URL).expect("fixture keys parse")
}

pub fn test_config(app_url: &str, providers: Vec<ProviderConfig>) -> AppConfig {
    AppConfig {
        listen_addr: "127.0.0.1:0".into(),
        database_url: None,
        app_url: app_url.into(),
        allowed_returns: vec![ALLOWED_RETURN.into()],
        cookie_name: "session_token".into(),
        flow_cookie_name: "login_flow".into(),
        flow_session_ttl_secs: 600,
        token: token_config(),
        providers,
    }
}

pub fn identity(provider: ProviderKind, external_id: &str, email: &str) -> ExternalIdentity {
    ExternalIdentity {
        provider,
        external_id: external_id.into(),
        email: email.into(),
        display_name: format!("user {external_id}"),
    }
}

/// Provider double that hands out a preset identity for any code.
pub struct FakeProvider {
    id: String,
    kind: ProviderKind,
    identity: Mutex<Option<ExternalIdentity>>,
    pub exchanges: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new(id: &str, kind: ProviderKind, identity: Option<ExternalIdentity>) -> Self {
        Self {
            id: id.into(),
            kind,
            identity: Mutex::new(identity),
            exchanges: Mutex::new(Vec::new()),
        }
    }

    pub fn exchange_count(&self) -> usize {
        self.exchanges.lock().unwrap().len()
    }
}

#[async_trait]
impl OAuthProvider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn login_url(&self, csrf_token: &str, redirect_uri: &str) -> String {
        Url::parse_with_params(
            "https://provider.example/authorize",
            &[("state", csrf_token), ("redirect_uri", redirect_uri)],
        )
        .unwrap()
        .into()
    }

    async fn exchange_code(
        &self,
        code: &str,
        _redirect_uri: &str,
    ) -> Result<(ExternalIdentity, serde_json::Value), ProviderError> {
        self.exchanges.lock().unwrap().push(code.to_string());
        match self.identity.lock().unwrap().clone() {
            Some(identity) => Ok((identity, serde_json::json!({}))),
            None => Err(ProviderError::Rejected {
                provider: self.id.clone(),
                error: "bad_verification_code".into(),
                description: None,
            }),
        }
    }
}

/// Fully wired application over in-memory stores.
pub struct TestApp {
    pub resources: AppResources,
    pub accounts: Arc<MemoryAccountStore>,
    pub sessions: Arc<MemorySessionStore>,
}

pub fn build_app(config: AppConfig, providers: ProviderRegistry) -> TestApp {
    let accounts = Arc::new(MemoryAccountStore::new());
    build_app_with_store(config, providers, accounts.clone(), accounts)
}

pub fn build_app_with_store(
    config: AppConfig,
    providers: ProviderRegistry,
    store: Arc<dyn AccountStore>,
    accounts: Arc<MemoryAccountStore>,
) -> TestApp {
    let app_url = config.parsed_app_url().unwrap();
    let allowed_returns = config.parsed_allowed_returns().unwrap();
    let tokens = Arc::new(TokenEngine::new(&config.token, APP_URL).unwrap());
    let sessions = Arc::new(MemorySessionStore::new(Duration::from_secs(
        config.flow_session_ttl_secs,
    )));
    let session_store: Arc<dyn FlowSessionStore> = sessions.clone();

    let flow = Arc::new(FlowController::new(
        providers,
        Reconciler::new(store.clone()),
        tokens.clone(),
        session_store,
        app_url,
        allowed_returns,
    ));

    TestApp {
        resources: AppResources {
            flow,
            tokens,
            accounts: store,
            config: Arc::new(config),
        },
        accounts,
        sessions,
    }
}

pub fn registry_with(provider: Arc<dyn OAuthProvider>) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register(provider);
    registry
}

/// Value of the `state` query parameter of a provider redirect.
pub fn state_param(location: &str) -> String {
    Url::parse(location)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .expect("redirect carries a state parameter")
}

/// `name=value` of the first `Set-Cookie` header for `name`.
pub fn set_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(axum::http::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{name}=")))
}

/// Value part of a `Set-Cookie` header.
pub fn cookie_value(set_cookie: &str) -> String {
    let pair = set_cookie.split(';').next().unwrap_or_default();
    pair.split_once('=')
        .map(|(_, v)| v.to_string())
        .unwrap_or_default()
}
