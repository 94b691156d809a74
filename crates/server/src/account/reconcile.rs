//! Maps an external identity onto a local account.

use super::{Account, AccountStore, ProviderLink};
use crate::error::{FlowError, StoreError};
use crate::provider::ExternalIdentity;
use std::sync::Arc;

/// Lookup-or-create chain over an [`AccountStore`]:
///
/// 1. account already linked to `(provider, external_id)` -> returned as is
/// 2. account with the same email -> the new provider is linked to it
/// 3. otherwise a new standard account is created
///
/// Only [`StoreError::NotFound`] moves on to the next step. Any other store
/// failure ends the chain.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn AccountStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    #[tracing::instrument(
        skip(self, identity),
        fields(provider = %identity.provider, external_id = %identity.external_id)
    )]
    pub async fn reconcile(&self, identity: &ExternalIdentity) -> Result<Account, FlowError> {
        match self
            .store
            .find_by_provider(identity.provider, &identity.external_id)
            .await
        {
            Ok(account) => return Ok(account),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(FlowError::internal("failed to look up account by provider", e)),
        }

        if !identity.email.is_empty() {
            match self.store.find_by_email(&identity.email).await {
                Ok(mut account) => {
                    let link = ProviderLink::from(identity);
                    self.store
                        .link_provider(&account.id, link.clone())
                        .await
                        .map_err(|e| FlowError::internal("failed to link provider", e))?;
                    tracing::info!(account_id = %account.id, "linked provider to existing account");
                    if !account.is_linked_to(link.provider, &link.external_id) {
                        account.providers.push(link);
                    }
                    return Ok(account);
                }
                Err(StoreError::NotFound) => {}
                Err(e) => {
                    return Err(FlowError::internal("failed to look up account by email", e));
                }
            }
        }

        match self.store.create(Account::from_identity(identity)).await {
            Ok(account) => {
                tracing::info!(account_id = %account.id, "created account");
                Ok(account)
            }
            // A concurrent login of the same identity won the unique index.
            Err(StoreError::Conflict(detail)) => {
                tracing::warn!(%detail, "account created concurrently, reading winner");
                self.store
                    .find_by_provider(identity.provider, &identity.external_id)
                    .await
                    .map_err(|e| FlowError::internal("failed to read concurrently created account", e))
            }
            Err(e) => Err(FlowError::internal("failed to create account", e)),
        }
    }
}
