//! In-process account store, used for development setups and tests.

use super::{Account, AccountStore, ProviderLink};
use crate::error::StoreError;
use crate::provider::ProviderKind;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: DashMap<String, (u64, Account)>,
    /// (provider, external id) -> account id; doubles as the uniqueness guard
    links: DashMap<(ProviderKind, String), String>,
    sequence: AtomicU64,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Snapshot of every stored account, oldest first.
    pub fn accounts(&self) -> Vec<Account> {
        let mut all: Vec<(u64, Account)> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by_key(|(seq, _)| *seq);
        all.into_iter().map(|(_, account)| account).collect()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_id(&self, id: &str) -> Result<Account, StoreError> {
        self.accounts
            .get(id)
            .map(|entry| entry.value().1.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_provider(
        &self,
        provider: ProviderKind,
        external_id: &str,
    ) -> Result<Account, StoreError> {
        let account_id = self
            .links
            .get(&(provider, external_id.to_string()))
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound)?;
        self.find_by_id(&account_id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Account, StoreError> {
        self.accounts
            .iter()
            .filter(|entry| entry.value().1.email == email)
            .min_by_key(|entry| entry.value().0)
            .map(|entry| entry.value().1.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn create(&self, account: Account) -> Result<Account, StoreError> {
        // The account is visible before its links, so a claimed link never
        // points at a missing account.
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        match self.accounts.entry(account.id.clone()) {
            Entry::Occupied(_) => {
                return Err(StoreError::Conflict(format!(
                    "account {} already exists",
                    account.id
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert((seq, account.clone()));
            }
        }

        let mut claimed = Vec::with_capacity(account.providers.len());
        for link in &account.providers {
            let key = (link.provider, link.external_id.clone());
            let inserted = match self.links.entry(key.clone()) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(account.id.clone());
                    true
                }
            };
            if !inserted {
                for key in claimed {
                    self.links.remove(&key);
                }
                self.accounts.remove(&account.id);
                return Err(StoreError::Conflict(format!(
                    "{}:{} is already linked",
                    link.provider, link.external_id
                )));
            }
            claimed.push(key);
        }

        Ok(account)
    }

    async fn link_provider(
        &self,
        account_id: &str,
        link: ProviderLink,
    ) -> Result<(), StoreError> {
        let mut account = self
            .accounts
            .get_mut(account_id)
            .ok_or(StoreError::NotFound)?;

        match self.links.entry((link.provider, link.external_id.clone())) {
            Entry::Occupied(existing) if existing.get() == account_id => Ok(()),
            Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "{}:{} is already linked",
                link.provider, link.external_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(account_id.to_string());
                account.value_mut().1.providers.push(link);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Role;

    fn account(id: &str, email: &str, provider: ProviderKind, external_id: &str) -> Account {
        Account {
            id: id.into(),
            email: email.into(),
            display_name: id.into(),
            role: Role::Standard,
            providers: vec![ProviderLink {
                provider,
                external_id: external_id.into(),
            }],
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_link() {
        let store = MemoryAccountStore::new();
        store
            .create(account("a", "a@example.com", ProviderKind::GitHub, "1"))
            .await
            .unwrap();
        let err = store
            .create(account("b", "b@example.com", ProviderKind::GitHub, "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn find_by_email_returns_oldest() {
        let store = MemoryAccountStore::new();
        store
            .create(account("first", "same@example.com", ProviderKind::GitHub, "1"))
            .await
            .unwrap();
        store
            .create(account("second", "same@example.com", ProviderKind::Google, "g1"))
            .await
            .unwrap();
        let found = store.find_by_email("same@example.com").await.unwrap();
        assert_eq!(found.id, "first");
    }

    #[tokio::test]
    async fn link_provider_appends_and_indexes() {
        let store = MemoryAccountStore::new();
        store
            .create(account("a", "a@example.com", ProviderKind::GitHub, "1"))
            .await
            .unwrap();
        store
            .link_provider(
                "a",
                ProviderLink {
                    provider: ProviderKind::Google,
                    external_id: "g-1".into(),
                },
            )
            .await
            .unwrap();

        let by_google = store
            .find_by_provider(ProviderKind::Google, "g-1")
            .await
            .unwrap();
        assert_eq!(by_google.id, "a");
        assert_eq!(by_google.providers.len(), 2);
    }

    #[tokio::test]
    async fn link_provider_to_missing_account_is_not_found() {
        let store = MemoryAccountStore::new();
        let err = store
            .link_provider(
                "ghost",
                ProviderLink {
                    provider: ProviderKind::GitHub,
                    external_id: "1".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }
}
