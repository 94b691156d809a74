//! SeaORM account store against in-memory SQLite.

use federated_login::account::{
    Account, AccountStore, DbAccountStore, ProviderLink, Reconciler, Role,
};
use federated_login::error::StoreError;
use federated_login::provider::{ExternalIdentity, ProviderKind};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement};
use std::sync::Arc;
use std::time::Duration;

/// Create an in-memory SQLite database with the account tables.
async fn setup_test_db() -> Arc<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"CREATE TABLE account (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            display_name TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'standard',
            created_at TEXT NOT NULL
        );"#,
    ))
    .await
    .expect("Failed to create account table");

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        "CREATE INDEX idx_account_email ON account (email);",
    ))
    .await
    .expect("Failed to create email index");

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"CREATE TABLE account_provider (
            id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL REFERENCES account (id) ON DELETE CASCADE,
            provider TEXT NOT NULL,
            external_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        );"#,
    ))
    .await
    .expect("Failed to create account_provider table");

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        "CREATE UNIQUE INDEX idx_account_provider_identity_unique ON account_provider (provider, external_id);",
    ))
    .await
    .expect("Failed to create identity index");

    Arc::new(db)
}

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
async fn create_then_find_by_id_and_provider() {
    let store = DbAccountStore::new(setup_test_db().await);
    let mut admin = account("a1", "a@example.com", ProviderKind::GitHub, "100");
    admin.role = Role::Administrator;
    store.create(admin.clone()).await.unwrap();

    assert_eq!(store.find_by_id("a1").await.unwrap(), admin);
    assert_eq!(
        store
            .find_by_provider(ProviderKind::GitHub, "100")
            .await
            .unwrap()
            .id,
        "a1"
    );
    assert!(matches!(
        store.find_by_provider(ProviderKind::Google, "100").await,
        Err(StoreError::NotFound)
    ));
    assert!(matches!(
        store.find_by_id("missing").await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn duplicate_identity_conflicts_and_rolls_back() {
    let store = DbAccountStore::new(setup_test_db().await);
    store
        .create(account("first", "x@example.com", ProviderKind::GitHub, "7"))
        .await
        .unwrap();

    let err = store
        .create(account("second", "y@example.com", ProviderKind::GitHub, "7"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)), "{err}");
    assert!(matches!(
        store.find_by_id("second").await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn find_by_email_returns_oldest_account() {
    let store = DbAccountStore::new(setup_test_db().await);
    store
        .create(account("zz-older", "shared@example.com", ProviderKind::GitHub, "1"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    store
        .create(account("aa-newer", "shared@example.com", ProviderKind::Google, "2"))
        .await
        .unwrap();

    let found = store.find_by_email("shared@example.com").await.unwrap();
    assert_eq!(found.id, "zz-older");
    assert!(matches!(
        store.find_by_email("nobody@example.com").await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn link_provider_rules() {
    let store = DbAccountStore::new(setup_test_db().await);
    store
        .create(account("one", "one@example.com", ProviderKind::GitHub, "1"))
        .await
        .unwrap();
    store
        .create(account("two", "two@example.com", ProviderKind::GitHub, "2"))
        .await
        .unwrap();

    let google = ProviderLink {
        provider: ProviderKind::Google,
        external_id: "g1".into(),
    };
    store.link_provider("one", google.clone()).await.unwrap();
    // Linking again to the same account is a no-op
    store.link_provider("one", google.clone()).await.unwrap();

    let one = store.find_by_id("one").await.unwrap();
    assert_eq!(one.providers.len(), 2);
    assert!(one.is_linked_to(ProviderKind::Google, "g1"));

    assert!(matches!(
        store.link_provider("two", google).await,
        Err(StoreError::Conflict(_))
    ));
    assert!(matches!(
        store
            .link_provider(
                "ghost",
                ProviderLink {
                    provider: ProviderKind::Google,
                    external_id: "g2".into(),
                }
            )
            .await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn reconciler_links_by_email_over_database() {
    let store = Arc::new(DbAccountStore::new(setup_test_db().await));
    let reconciler = Reconciler::new(store.clone());

    let github = ExternalIdentity {
        provider: ProviderKind::GitHub,
        external_id: "583231".into(),
        email: "octo@example.com".into(),
        display_name: "Octo".into(),
    };
    let google = ExternalIdentity {
        provider: ProviderKind::Google,
        external_id: "1098765".into(),
        email: "octo@example.com".into(),
        display_name: "Octo G".into(),
    };

    let first = reconciler.reconcile(&github).await.unwrap();
    let second = reconciler.reconcile(&google).await.unwrap();
    let third = reconciler.reconcile(&github).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.id, third.id);
    let stored = store.find_by_id(&first.id).await.unwrap();
    assert_eq!(stored.providers.len(), 2);
    assert_eq!(stored.display_name, "Octo");
}
