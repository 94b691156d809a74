//! The two-phase OAuth login flow.
//!
//! `begin_login` parks a CSRF token and return target in a fresh flow session
//! and points the browser at the provider. `complete_callback` consumes that
//! session, checks the echoed state, exchanges the code, reconciles the
//! identity and issues a session token. The HTTP layer turns the outcome into
//! cookies and a redirect.

pub mod return_target;

pub use return_target::validate_return_target;

use crate::account::{Account, Reconciler};
use crate::error::FlowError;
use crate::provider::{ProviderKind, ProviderRegistry};
use crate::session::{FlowSessionStore, FlowState, random_token};
use crate::token::TokenEngine;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use url::Url;
use utoipa::IntoParams;

/// Where a single login attempt stands. Only used for logging, the state
/// itself lives in the flow session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPhase {
    AwaitingCallback,
    Completed,
    Failed,
}

impl fmt::Display for FlowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FlowPhase::AwaitingCallback => "awaiting_callback",
            FlowPhase::Completed => "completed",
            FlowPhase::Failed => "failed",
        })
    }
}

/// Result of a successful login start.
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    /// New flow session, to be stored in the flow cookie
    pub session_id: String,
    /// Provider authorization URL
    pub location: String,
}

/// Query parameters the provider sends back to the callback.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    /// CSRF token echoed back by the provider
    pub state: Option<String>,
    /// Authorization code
    pub code: Option<String>,
    /// Error code reported by the provider
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Result of a successful callback.
#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    pub account: Account,
    pub token: String,
    /// Redirect target: the stored return URL or `/`
    pub location: String,
    /// Cookie domain, the return target's host. `None` for `/`.
    pub cookie_domain: Option<String>,
}

pub struct FlowController {
    providers: ProviderRegistry,
    reconciler: Reconciler,
    tokens: Arc<TokenEngine>,
    sessions: Arc<dyn FlowSessionStore>,
    app_url: Url,
    allowed_returns: Vec<Url>,
}

impl FlowController {
    pub fn new(
        providers: ProviderRegistry,
        reconciler: Reconciler,
        tokens: Arc<TokenEngine>,
        sessions: Arc<dyn FlowSessionStore>,
        app_url: Url,
        allowed_returns: Vec<Url>,
    ) -> Self {
        Self {
            providers,
            reconciler,
            tokens,
            sessions,
            app_url,
            allowed_returns,
        }
    }

    /// Credential cookies are `Secure` unless the service itself runs on plain http.
    pub fn secure_cookies(&self) -> bool {
        self.app_url.scheme() != "http"
    }

    /// Callback URL registered with the provider for `kind`/`provider_id`.
    pub fn callback_url(&self, kind: ProviderKind, provider_id: &str) -> String {
        format!(
            "{}/oauth/callback/{}/{}",
            self.app_url.as_str().trim_end_matches('/'),
            kind,
            provider_id
        )
    }

    #[tracing::instrument(skip(self, previous_session))]
    pub async fn begin_login(
        &self,
        provider_id: &str,
        return_to: Option<&str>,
        previous_session: Option<&str>,
    ) -> Result<LoginRedirect, FlowError> {
        let provider = self.providers.get(provider_id)?;
        let session_id = self.sessions.new_session(previous_session).await?;
        let return_to = validate_return_target(return_to, &self.allowed_returns)?;

        let csrf_token =
            random_token().map_err(|e| FlowError::internal("failed to generate CSRF token", e))?;
        self.sessions
            .save(
                &session_id,
                FlowState {
                    csrf_token: csrf_token.clone(),
                    return_to,
                },
            )
            .await?;

        let redirect_uri = self.callback_url(provider.kind(), provider.id());
        tracing::info!(phase = %FlowPhase::AwaitingCallback, "login started");
        Ok(LoginRedirect {
            session_id,
            location: provider.login_url(&csrf_token, &redirect_uri),
        })
    }

    #[tracing::instrument(skip(self, params, session_id))]
    pub async fn complete_callback(
        &self,
        provider_type: &str,
        provider_id: &str,
        params: &CallbackParams,
        session_id: Option<&str>,
    ) -> Result<CallbackOutcome, FlowError> {
        match self
            .run_callback(provider_type, provider_id, params, session_id)
            .await
        {
            Ok(outcome) => {
                tracing::info!(
                    phase = %FlowPhase::Completed,
                    account_id = %outcome.account.id,
                    "login completed"
                );
                Ok(outcome)
            }
            Err(e) => {
                tracing::info!(phase = %FlowPhase::Failed, kind = e.kind().as_str(), "login failed");
                Err(e)
            }
        }
    }

    async fn run_callback(
        &self,
        provider_type: &str,
        provider_id: &str,
        params: &CallbackParams,
        session_id: Option<&str>,
    ) -> Result<CallbackOutcome, FlowError> {
        // Loading consumes the session, whatever happens next.
        let state = match session_id {
            Some(id) => self.sessions.load(id).await?,
            None => None,
        };

        let provider = self.providers.get(provider_id)?;
        let kind: ProviderKind = provider_type.parse().map_err(FlowError::BadRequest)?;
        if kind != provider.kind() {
            return Err(FlowError::bad_request(format!(
                "provider {provider_id} is not of type {kind}"
            )));
        }

        if let Some(error) = params.error.as_deref().filter(|e| !e.is_empty()) {
            tracing::warn!(
                error,
                description = params.error_description.as_deref().unwrap_or_default(),
                "provider reported an error"
            );
            return Err(FlowError::bad_request(error));
        }

        let received = params.state.as_deref().unwrap_or_default();
        if received.is_empty() {
            return Err(FlowError::bad_request("missing state parameter"));
        }
        let state = state.ok_or_else(|| FlowError::bad_request("no login in progress"))?;
        if !bool::from(state.csrf_token.as_bytes().ct_eq(received.as_bytes())) {
            return Err(FlowError::bad_request("state mismatch"));
        }

        let code = params.code.as_deref().unwrap_or_default();
        if code.is_empty() {
            return Err(FlowError::bad_request("missing code parameter"));
        }

        let redirect_uri = self.callback_url(kind, provider_id);
        let (identity, _profile) = provider.exchange_code(code, &redirect_uri).await?;
        let account = self.reconciler.reconcile(&identity).await?;
        let token = self
            .tokens
            .issue(&account)
            .map_err(|e| FlowError::internal("failed to issue token", e))?;

        let (location, cookie_domain) = match state.return_to {
            Some(url) => {
                let domain = url.host_str().map(str::to_string);
                (url.to_string(), domain)
            }
            None => ("/".to_string(), None),
        };

        Ok(CallbackOutcome {
            account,
            token,
            location,
            cookie_domain,
        })
    }
}
