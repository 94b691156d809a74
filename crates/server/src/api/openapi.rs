//! OpenAPI/Utoipa configuration.

use crate::api::{accounts::ACCOUNTS_TAG, health::MISC_TAG, oauth::OAUTH_TAG};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

/// Name of the cookie credential in the generated document. The real cookie
/// name is configurable.
const DOC_COOKIE_NAME: &str = "session_token";

/// Security addon for OpenAPI documentation.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let bearer = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("JWT")
                .description(Some(
                    "Session token issued by the OAuth callback. Verify it yourself with the key from `/api/public-key`.",
                ))
                .build();
            components.add_security_scheme("Authorization", SecurityScheme::Http(bearer));
            components.add_security_scheme(
                "Cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(DOC_COOKIE_NAME))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Federated Login API",
        version = "1.0.0",
        description = "Log in through a third-party OAuth provider and receive a signed session token."
    ),
    components(schemas(crate::error::ErrorResponse)),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = OAUTH_TAG, description = "OAuth login flow"),
        (name = ACCOUNTS_TAG, description = "Token verification material and account lookups")
    )
)]
pub struct ApiDoc;
