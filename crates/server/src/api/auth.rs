//! Session token extractor for the account endpoints.

use crate::AppResources;
use crate::error::FlowError;
use crate::token::Claims;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use axum_extra::extract::CookieJar;

/// Verified claims of the caller.
///
/// The token is taken from `Authorization: Bearer <token>` or, failing that,
/// from the credential cookie set by the OAuth callback.
///
/// ```ignore
/// async fn handler(Authenticated(claims): Authenticated) -> String {
///     claims.sub
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Authenticated(pub Claims);

impl<S> FromRequestParts<S> for Authenticated
where
    AppResources: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = FlowError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let resources = AppResources::from_ref(state);

        let token = match bearer_token(&parts.headers)? {
            Some(token) => token,
            None => CookieJar::from_headers(&parts.headers)
                .get(&resources.config.cookie_name)
                .map(|c| c.value().to_string())
                .ok_or_else(|| FlowError::Unauthorized("missing session token".into()))?,
        };

        resources
            .tokens
            .verify(&token)
            .map(Authenticated)
            .map_err(|e| FlowError::Unauthorized(e.to_string()))
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<Option<String>, FlowError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| FlowError::Unauthorized("malformed Authorization header".into()))?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
        _ => Err(FlowError::Unauthorized(
            "Authorization header must use the Bearer scheme".into(),
        )),
    }
}
