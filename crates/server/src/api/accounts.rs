//! Token verification material and account lookups.
//!
//! - `/public-key` - PEM public key for verifying session tokens
//! - `/whoami` - the caller's account
//! - `/accounts/{id}` - an account, readable only by itself
//! - `/accounts/by-provider/{provider}/{external_id}` - administrator lookup

use crate::AppResources;
use crate::account::{Account, Role};
use crate::api::auth::Authenticated;
use crate::error::FlowError;
use crate::provider::ProviderKind;
use axum::{
    Json,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const ACCOUNTS_TAG: &str = "Accounts";

pub const PEM_CONTENT_TYPE: &str = "application/x-pem-file";

pub fn router() -> OpenApiRouter<AppResources> {
    OpenApiRouter::new()
        .routes(routes!(public_key))
        .routes(routes!(whoami))
        .routes(routes!(get_account))
        .routes(routes!(get_account_by_provider))
}

#[utoipa::path(
    get,
    path = "/public-key",
    tag = ACCOUNTS_TAG,
    operation_id = "Get Public Key",
    summary = "Token verification key",
    description = "Ed25519 public key (SPKI PEM) that session tokens are signed with. \
                   Relying parties verify tokens locally with it; tokens use the EdDSA algorithm only.",
    responses(
        (status = 200, description = "PEM encoded public key", body = str, content_type = "application/x-pem-file")
    )
)]
async fn public_key(State(resources): State<AppResources>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, PEM_CONTENT_TYPE)],
        resources.tokens.public_key().to_vec(),
    )
}

#[tracing::instrument(skip(resources, claims), fields(sub = %claims.sub))]
#[utoipa::path(
    get,
    path = "/whoami",
    tag = ACCOUNTS_TAG,
    operation_id = "Who Am I",
    summary = "The caller's account",
    security(("Authorization" = []), ("Cookie" = [])),
    responses(
        (status = 200, description = "Account of the token subject", body = Account),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorResponse),
        (status = 404, description = "Account no longer exists", body = crate::error::ErrorResponse)
    )
)]
async fn whoami(
    State(resources): State<AppResources>,
    Authenticated(claims): Authenticated,
) -> Result<Json<Account>, FlowError> {
    Ok(Json(resources.accounts.find_by_id(&claims.sub).await?))
}

#[tracing::instrument(skip(resources, claims), fields(sub = %claims.sub))]
#[utoipa::path(
    get,
    path = "/accounts/{id}",
    tag = ACCOUNTS_TAG,
    operation_id = "Get Account",
    summary = "Read an account",
    description = "Only the account itself may read it.",
    security(("Authorization" = []), ("Cookie" = [])),
    params(("id" = String, Path, description = "Account id")),
    responses(
        (status = 200, description = "The account", body = Account),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorResponse),
        (status = 403, description = "Token subject is a different account", body = crate::error::ErrorResponse),
        (status = 404, description = "Account not found", body = crate::error::ErrorResponse)
    )
)]
async fn get_account(
    State(resources): State<AppResources>,
    Authenticated(claims): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Account>, FlowError> {
    if claims.sub != id {
        return Err(FlowError::Forbidden(
            "accounts can only be read by their owner".into(),
        ));
    }
    Ok(Json(resources.accounts.find_by_id(&id).await?))
}

#[tracing::instrument(skip(resources, claims), fields(sub = %claims.sub))]
#[utoipa::path(
    get,
    path = "/accounts/by-provider/{provider}/{external_id}",
    tag = ACCOUNTS_TAG,
    operation_id = "Get Account By Provider",
    summary = "Find the account linked to a provider identity",
    description = "Administrators only.",
    security(("Authorization" = []), ("Cookie" = [])),
    params(
        ("provider" = ProviderKind, Path, description = "Provider kind"),
        ("external_id" = String, Path, description = "Provider-assigned user id")
    ),
    responses(
        (status = 200, description = "The linked account", body = Account),
        (status = 400, description = "Unknown provider kind", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller is not an administrator", body = crate::error::ErrorResponse),
        (status = 404, description = "No account is linked to this identity", body = crate::error::ErrorResponse)
    )
)]
async fn get_account_by_provider(
    State(resources): State<AppResources>,
    Authenticated(claims): Authenticated,
    Path((provider, external_id)): Path<(String, String)>,
) -> Result<Json<Account>, FlowError> {
    if claims.role != Role::Administrator {
        return Err(FlowError::Forbidden("administrator role required".into()));
    }
    let provider: ProviderKind = provider.parse().map_err(FlowError::BadRequest)?;
    Ok(Json(
        resources
            .accounts
            .find_by_provider(provider, &external_id)
            .await?,
    ))
}
