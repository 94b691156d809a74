//! Federated login: exchanges third-party OAuth logins for signed first-party
//! session tokens.
//!
//! A browser is sent through an OAuth authorization-code flow with one of the
//! configured providers. On the way back the external identity is reconciled
//! into a local [`account::Account`] and an EdDSA-signed JWT is set as a
//! cookie. Relying parties verify that token with the public key alone.

use std::sync::Arc;

use crate::account::AccountStore;
use crate::config::AppConfig;
use crate::flow::FlowController;
use crate::token::TokenEngine;

pub mod account;
pub mod api;
pub mod config;
pub mod entity;
pub mod error;
pub mod flow;
pub mod provider;
pub mod session;
pub mod token;

/// Everything request handlers need, cloned into each request.
#[derive(Clone)]
pub struct AppResources {
    pub flow: Arc<FlowController>,
    pub tokens: Arc<TokenEngine>,
    pub accounts: Arc<dyn AccountStore>,
    pub config: Arc<AppConfig>,
}
