//! Accounts and their linked provider identities.
//!
//! `account.email` is indexed for the soft-link lookup but not unique.
//! `(provider, external_id)` on `account_provider` is unique: an external
//! identity belongs to at most one account.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Account::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Account::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Account::Email).string().not_null())
                    .col(ColumnDef::new(Account::DisplayName).string().not_null())
                    .col(
                        ColumnDef::new(Account::Role)
                            .string()
                            .not_null()
                            .default("standard"),
                    )
                    .col(
                        ColumnDef::new(Account::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_account_email")
                    .table(Account::Table)
                    .col(Account::Email)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AccountProvider::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AccountProvider::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AccountProvider::AccountId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AccountProvider::Provider)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AccountProvider::ExternalId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AccountProvider::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_account_provider_account")
                            .from(AccountProvider::Table, AccountProvider::AccountId)
                            .to(Account::Table, Account::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_account_provider_identity_unique")
                    .table(AccountProvider::Table)
                    .col(AccountProvider::Provider)
                    .col(AccountProvider::ExternalId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_account_provider_account_id")
                    .table(AccountProvider::Table)
                    .col(AccountProvider::AccountId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AccountProvider::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Account::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Account {
    Table,
    Id,
    Email,
    DisplayName,
    Role,
    CreatedAt,
}

#[derive(Iden)]
enum AccountProvider {
    Table,
    Id,
    AccountId,
    Provider,
    ExternalId,
    CreatedAt,
}
