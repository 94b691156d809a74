//! HTTP surface.
//!
//! - `oauth` - login and callback endpoints (/oauth/*)
//! - `accounts` - public key and account lookups (/api/*)
//! - `auth` - token extractor for the account endpoints
//! - `health` - health check endpoint (/healthz)
//! - `openapi` - OpenAPI/Utoipa configuration

pub mod accounts;
pub mod auth;
pub mod health;
pub mod oauth;
pub mod openapi;

pub use accounts::ACCOUNTS_TAG;
pub use health::MISC_TAG;
pub use oauth::OAUTH_TAG;

use crate::AppResources;
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Build the full application router, docs included.
pub fn build_router(resources: AppResources) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .nest("/oauth", oauth::router())
        .nest("/api", accounts::router())
        .routes(routes!(health::health))
        .with_state(resources)
        .split_for_parts();

    router
        .merge(Redoc::with_url("/api-docs", api))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Starts the web server on the configured listen address.
#[tracing::instrument(skip(resources))]
pub async fn start_webserver(resources: AppResources) -> color_eyre::Result<()> {
    let addr = resources.config.listen_addr.clone();
    let router = build_router(resources);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "server running");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
