//! SeaORM-backed account store.

use super::{Account, AccountStore, ProviderLink, Role};
use crate::entity::{account, account_provider};
use crate::error::StoreError;
use crate::provider::ProviderKind;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(Clone)]
pub struct DbAccountStore {
    db: Arc<DatabaseConnection>,
}

impl DbAccountStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn links_of(&self, account_id: &str) -> Result<Vec<ProviderLink>, StoreError> {
        account_provider::Entity::find()
            .filter(account_provider::Column::AccountId.eq(account_id))
            .order_by_asc(account_provider::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(|row| {
                let provider = row
                    .provider
                    .parse::<ProviderKind>()
                    .map_err(StoreError::Backend)?;
                Ok(ProviderLink {
                    provider,
                    external_id: row.external_id,
                })
            })
            .collect()
    }

    async fn hydrate(&self, model: account::Model) -> Result<Account, StoreError> {
        let role = model.role.parse::<Role>().map_err(StoreError::Backend)?;
        let providers = self.links_of(&model.id).await?;
        Ok(Account {
            id: model.id,
            email: model.email,
            display_name: model.display_name,
            role,
            providers,
        })
    }

    fn link_row(account_id: &str, link: &ProviderLink) -> account_provider::ActiveModel {
        account_provider::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            account_id: Set(account_id.to_string()),
            provider: Set(link.provider.as_str().to_string()),
            external_id: Set(link.external_id.clone()),
            created_at: Set(OffsetDateTime::now_utc()),
        }
    }
}

#[async_trait]
impl AccountStore for DbAccountStore {
    #[tracing::instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> Result<Account, StoreError> {
        let model = account::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(StoreError::NotFound)?;
        self.hydrate(model).await
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_provider(
        &self,
        provider: ProviderKind,
        external_id: &str,
    ) -> Result<Account, StoreError> {
        let link = account_provider::Entity::find()
            .filter(account_provider::Column::Provider.eq(provider.as_str()))
            .filter(account_provider::Column::ExternalId.eq(external_id))
            .one(self.db.as_ref())
            .await?
            .ok_or(StoreError::NotFound)?;
        self.find_by_id(&link.account_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> Result<Account, StoreError> {
        let model = account::Entity::find()
            .filter(account::Column::Email.eq(email))
            .order_by_asc(account::Column::CreatedAt)
            .order_by_asc(account::Column::Id)
            .one(self.db.as_ref())
            .await?
            .ok_or(StoreError::NotFound)?;
        self.hydrate(model).await
    }

    #[tracing::instrument(skip(self, account), fields(account_id = %account.id))]
    async fn create(&self, account: Account) -> Result<Account, StoreError> {
        let txn = self.db.begin().await?;

        account::ActiveModel {
            id: Set(account.id.clone()),
            email: Set(account.email.clone()),
            display_name: Set(account.display_name.clone()),
            role: Set(account.role.as_str().to_string()),
            created_at: Set(OffsetDateTime::now_utc()),
        }
        .insert(&txn)
        .await?;

        for link in &account.providers {
            Self::link_row(&account.id, link).insert(&txn).await?;
        }

        txn.commit().await?;
        Ok(account)
    }

    #[tracing::instrument(skip(self))]
    async fn link_provider(
        &self,
        account_id: &str,
        link: ProviderLink,
    ) -> Result<(), StoreError> {
        account::Entity::find_by_id(account_id)
            .one(self.db.as_ref())
            .await?
            .ok_or(StoreError::NotFound)?;

        if let Some(existing) = account_provider::Entity::find()
            .filter(account_provider::Column::Provider.eq(link.provider.as_str()))
            .filter(account_provider::Column::ExternalId.eq(link.external_id.as_str()))
            .one(self.db.as_ref())
            .await?
        {
            if existing.account_id == account_id {
                return Ok(());
            }
            return Err(StoreError::Conflict(format!(
                "{}:{} is already linked",
                link.provider, link.external_id
            )));
        }

        Self::link_row(account_id, &link)
            .insert(self.db.as_ref())
            .await?;
        Ok(())
    }
}
