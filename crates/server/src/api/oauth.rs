//! OAuth login flow endpoints.
//!
//! - `/login/{provider_id}` - start a login, redirect to the provider
//! - `/callback/{provider_type}/{provider_id}` - finish it, set the session cookie

use crate::AppResources;
use crate::flow::CallbackParams;
use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use serde::Deserialize;
use utoipa::IntoParams;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const OAUTH_TAG: &str = "OAuth";

/// The flow cookie only needs to reach the callback.
const FLOW_COOKIE_PATH: &str = "/oauth";

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LoginParams {
    /// Absolute URL to return to after login. Its origin must be allow-listed.
    #[serde(rename = "return", default)]
    pub return_to: Option<String>,
}

pub fn router() -> OpenApiRouter<AppResources> {
    OpenApiRouter::new()
        .routes(routes!(login))
        .routes(routes!(callback))
}

fn found(location: String) -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, location)])
}

fn flow_cookie_removal(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), "")).path(FLOW_COOKIE_PATH).build()
}

#[tracing::instrument(skip(resources, jar))]
#[utoipa::path(
    get,
    path = "/login/{provider_id}",
    tag = OAUTH_TAG,
    operation_id = "Start Login",
    summary = "Redirect to the provider's login page",
    description = "Starts a fresh login attempt, discarding any previous one, and redirects the browser to the provider. \
                   A `return` target outside the allow-list fails the request; no redirect is issued.",
    params(
        ("provider_id" = String, Path, description = "Configured provider id, e.g. `github`"),
        LoginParams
    ),
    responses(
        (status = 302, description = "Redirect to the provider, flow cookie set"),
        (status = 400, description = "Unknown provider or disallowed return target", body = crate::error::ErrorResponse),
        (status = 500, description = "Internal error", body = crate::error::ErrorResponse)
    )
)]
async fn login(
    State(resources): State<AppResources>,
    Path(provider_id): Path<String>,
    Query(params): Query<LoginParams>,
    jar: CookieJar,
) -> Response {
    let config = &resources.config;
    let previous = jar
        .get(&config.flow_cookie_name)
        .map(|c| c.value().to_string());

    match resources
        .flow
        .begin_login(&provider_id, params.return_to.as_deref(), previous.as_deref())
        .await
    {
        Ok(redirect) => {
            let cookie = Cookie::build((config.flow_cookie_name.clone(), redirect.session_id))
                .path(FLOW_COOKIE_PATH)
                .http_only(true)
                .same_site(SameSite::Lax)
                .secure(resources.flow.secure_cookies())
                .max_age(time::Duration::seconds(
                    i64::try_from(config.flow_session_ttl_secs).unwrap_or(i64::MAX),
                ))
                .build();
            (jar.add(cookie), found(redirect.location)).into_response()
        }
        Err(e) => (jar.remove(flow_cookie_removal(&config.flow_cookie_name)), e).into_response(),
    }
}

#[tracing::instrument(skip(resources, params, jar))]
#[utoipa::path(
    get,
    path = "/callback/{provider_type}/{provider_id}",
    tag = OAUTH_TAG,
    operation_id = "Login Callback",
    summary = "Complete a login",
    description = "Target of the provider's redirect. Checks the echoed state against the login attempt, exchanges the code, \
                   finds or creates the account and sets the session token cookie before redirecting to the return target.",
    params(
        ("provider_type" = crate::provider::ProviderKind, Path, description = "Provider kind"),
        ("provider_id" = String, Path, description = "Configured provider id"),
        CallbackParams
    ),
    responses(
        (status = 302, description = "Redirect to the return target, session cookie set"),
        (status = 400, description = "State mismatch, missing parameters or provider-reported error", body = crate::error::ErrorResponse),
        (status = 502, description = "Code exchange with the provider failed", body = crate::error::ErrorResponse),
        (status = 500, description = "Internal error", body = crate::error::ErrorResponse)
    )
)]
async fn callback(
    State(resources): State<AppResources>,
    Path((provider_type, provider_id)): Path<(String, String)>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Response {
    let config = &resources.config;
    let session_id = jar
        .get(&config.flow_cookie_name)
        .map(|c| c.value().to_string());
    let jar = jar.remove(flow_cookie_removal(&config.flow_cookie_name));

    let outcome = match resources
        .flow
        .complete_callback(&provider_type, &provider_id, &params, session_id.as_deref())
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => return (jar, e).into_response(),
    };

    let max_age = i64::try_from(resources.tokens.valid_for().as_secs()).unwrap_or(i64::MAX);
    let mut cookie = Cookie::build((config.cookie_name.clone(), outcome.token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(resources.flow.secure_cookies())
        .max_age(time::Duration::seconds(max_age));
    if let Some(domain) = outcome.cookie_domain {
        cookie = cookie.domain(domain);
    }

    (jar.add(cookie.build()), found(outcome.location)).into_response()
}
