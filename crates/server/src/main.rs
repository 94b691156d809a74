use federated_login::AppResources;
use federated_login::account::{AccountStore, DbAccountStore, MemoryAccountStore, Reconciler};
use federated_login::api::start_webserver;
use federated_login::config::load_config_or_panic;
use federated_login::flow::FlowController;
use federated_login::provider::ProviderRegistry;
use federated_login::session::{FlowSessionStore, MemorySessionStore};
use federated_login::token::TokenEngine;
use sea_orm::Database;
use std::sync::Arc;
use tokio::time::{Duration, interval};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_standard_tracing() {
    let default_directives = "federated_login=info,tower_http=info,sea_orm=warn";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    initialize_standard_tracing();

    let config = Arc::new(load_config_or_panic());
    let app_url = config.parsed_app_url()?;
    let allowed_returns = config.parsed_allowed_returns()?;

    let accounts: Arc<dyn AccountStore> = match &config.database_url {
        Some(url) => {
            let db = Arc::new(Database::connect(url).await?);
            tracing::info!("using database account store");
            Arc::new(DbAccountStore::new(db))
        }
        None => {
            tracing::warn!("no database_url configured, accounts are kept in memory only");
            Arc::new(MemoryAccountStore::new())
        }
    };

    let tokens = Arc::new(TokenEngine::new(&config.token, app_url.as_str().trim_end_matches('/'))?);

    let http = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let providers = ProviderRegistry::from_config(&config.providers, http);
    if providers.is_empty() {
        tracing::warn!("no OAuth providers configured, every login will fail");
    }

    let session_store = Arc::new(MemorySessionStore::new(Duration::from_secs(
        config.flow_session_ttl_secs,
    )));

    // Periodically drop flow sessions whose callback never arrived
    {
        let sessions = session_store.clone();
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                let purged = sessions.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, remaining = sessions.len(), "purged expired flow sessions");
                }
            }
        });
    }
    let sessions: Arc<dyn FlowSessionStore> = session_store;

    let flow = Arc::new(FlowController::new(
        providers,
        Reconciler::new(accounts.clone()),
        tokens.clone(),
        sessions,
        app_url,
        allowed_returns,
    ));

    let resources = AppResources {
        flow,
        tokens,
        accounts,
        config,
    };

    start_webserver(resources).await?;
    Ok(())
}
