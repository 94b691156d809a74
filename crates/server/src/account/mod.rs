//! Local accounts and the store they live in.
//!
//! The store is an external collaborator; [`AccountStore`] is the seam. Two
//! adapters ship with the crate: [`MemoryAccountStore`] and the sea-orm backed
//! [`DbAccountStore`].

pub mod db;
pub mod memory;
pub mod reconcile;

pub use db::DbAccountStore;
pub use memory::MemoryAccountStore;
pub use reconcile::Reconciler;

use crate::error::StoreError;
use crate::provider::{ExternalIdentity, ProviderKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Standard,
    Administrator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Standard => "standard",
            Role::Administrator => "administrator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Role::Standard),
            "administrator" => Ok(Role::Administrator),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// One external identity attached to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProviderLink {
    pub provider: ProviderKind,
    pub external_id: String,
}

impl From<&ExternalIdentity> for ProviderLink {
    fn from(identity: &ExternalIdentity) -> Self {
        Self {
            provider: identity.provider,
            external_id: identity.external_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Account {
    /// Opaque stable identifier, also the token subject
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub providers: Vec<ProviderLink>,
}

impl Account {
    /// A fresh standard account linked to `identity`.
    pub fn from_identity(identity: &ExternalIdentity) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
            role: Role::Standard,
            providers: vec![ProviderLink::from(identity)],
        }
    }

    pub fn is_linked_to(&self, provider: ProviderKind, external_id: &str) -> bool {
        self.providers
            .iter()
            .any(|l| l.provider == provider && l.external_id == external_id)
    }
}

/// Persistence for accounts.
///
/// Lookups that find nothing return [`StoreError::NotFound`]. A `create` or
/// `link_provider` that would attach an already-linked `(provider, external_id)`
/// pair returns [`StoreError::Conflict`].
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Account, StoreError>;

    async fn find_by_provider(
        &self,
        provider: ProviderKind,
        external_id: &str,
    ) -> Result<Account, StoreError>;

    /// Oldest account registered with `email`. Emails are not unique.
    async fn find_by_email(&self, email: &str) -> Result<Account, StoreError>;

    async fn create(&self, account: Account) -> Result<Account, StoreError>;

    async fn link_provider(&self, account_id: &str, link: ProviderLink)
    -> Result<(), StoreError>;
}
