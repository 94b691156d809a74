//! Session token issuance and verification.
//!
//! Tokens are EdDSA (Ed25519) signed JWTs. Verification needs only the public
//! key, so relying parties can check tokens without calling back into this
//! service; [`TokenEngine::public_key`] exposes the PEM they need.

use crate::account::{Account, Role};
use crate::config::TokenConfig;
use crate::error::TokenError;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use utoipa::ToSchema;

/// The only algorithm tokens are signed with or accepted in.
pub const ALGORITHM: Algorithm = Algorithm::EdDSA;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Claims {
    /// Issuer, the application base URL
    pub iss: String,
    /// Account id
    pub sub: String,
    pub role: Role,
    /// Expiration, seconds since the epoch
    pub exp: u64,
    /// Issued at, seconds since the epoch
    pub iat: u64,
}

pub struct TokenEngine {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    public_key: Vec<u8>,
    issuer: String,
    valid_for: Duration,
    validation: Validation,
}

impl TokenEngine {
    pub fn new(config: &TokenConfig, issuer: impl Into<String>) -> Result<Self, TokenError> {
        let encoding_key = EncodingKey::from_ed_pem(config.private_key.as_bytes())
            .map_err(|source| TokenError::KeyParse {
                which: "private",
                source,
            })?;
        let decoding_key = DecodingKey::from_ed_pem(config.public_key.as_bytes())
            .map_err(|source| TokenError::KeyParse {
                which: "public",
                source,
            })?;

        let mut validation = Validation::new(ALGORITHM);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.validate_exp = true;
        validation.leeway = 0;

        Ok(Self {
            encoding_key,
            decoding_key,
            public_key: config.public_key.as_bytes().to_vec(),
            issuer: issuer.into(),
            valid_for: Duration::from_secs(config.valid_duration_secs),
            validation,
        })
    }

    /// Sign a token for `account`, valid for the configured duration.
    pub fn issue(&self, account: &Account) -> Result<String, TokenError> {
        let now = jsonwebtoken::get_current_timestamp();
        let claims = Claims {
            iss: self.issuer.clone(),
            sub: account.id.clone(),
            role: account.role,
            exp: now.saturating_add(self.valid_for.as_secs()),
            iat: now,
        };
        encode(&Header::new(ALGORITHM), &claims, &self.encoding_key).map_err(TokenError::Signing)
    }

    /// Check signature, algorithm and expiry, returning the claims.
    ///
    /// Every failure is reported as [`TokenError::Invalid`].
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "rejected token");
                TokenError::Invalid
            })
    }

    /// PEM-encoded public key, as configured.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn valid_for(&self) -> Duration {
        self.valid_for
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unparsable_keys() {
        let config = TokenConfig {
            private_key: "not a pem".into(),
            public_key: "also not a pem".into(),
            valid_duration_secs: 60,
        };
        match TokenEngine::new(&config, "https://auth.example.com") {
            Err(TokenError::KeyParse { which, .. }) => assert_eq!(which, "private"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("garbage keys were accepted"),
        }
    }
}
