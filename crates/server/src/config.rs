use crate::provider::ProviderKind;
use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Signing material and lifetime for issued session tokens.
#[derive(Clone, Deserialize)]
pub struct TokenConfig {
    /// Ed25519 private key, PKCS#8 PEM.
    pub private_key: String,
    /// Ed25519 public key, SPKI PEM. Served verbatim to relying parties.
    pub public_key: String,
    #[serde(default = "default_valid_duration_secs")]
    pub valid_duration_secs: u64,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .field("valid_duration_secs", &self.valid_duration_secs)
            .finish()
    }
}

#[derive(Clone, Deserialize)]
pub struct ProviderConfig {
    /// Identifier used in login/callback paths, e.g. `github`.
    pub id: String,
    pub kind: ProviderKind,
    pub client_id: String,
    pub client_secret: String,
    /// Overrides for the provider's public endpoints. Mostly useful for
    /// GitHub Enterprise installs and tests.
    #[serde(default)]
    pub authorize_url: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Account store database. When absent, accounts live in memory only.
    #[serde(default)]
    pub database_url: Option<String>,
    /// Public base URL of this service; token issuer and callback URL root.
    pub app_url: String,
    /// Origins a login may return to after the callback completes.
    #[serde(default)]
    pub allowed_returns: Vec<String>,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_flow_cookie_name")]
    pub flow_cookie_name: String,
    #[serde(default = "default_flow_session_ttl_secs")]
    pub flow_session_ttl_secs: u64,
    pub token: TokenConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_cookie_name() -> String {
    "session_token".to_string()
}

fn default_flow_cookie_name() -> String {
    "login_flow".to_string()
}

fn default_flow_session_ttl_secs() -> u64 {
    600
}

fn default_valid_duration_secs() -> u64 {
    86400
}

impl AppConfig {
    /// Parsed `app_url`. Only valid after [`AppConfig::validate`] succeeded.
    pub fn parsed_app_url(&self) -> Result<Url, ConfigError> {
        parse_absolute("app_url", &self.app_url)
    }

    /// Parsed allow-list of return origins.
    pub fn parsed_allowed_returns(&self) -> Result<Vec<Url>, ConfigError> {
        self.allowed_returns
            .iter()
            .map(|raw| parse_absolute("allowed_returns", raw))
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let app_url = self.parsed_app_url()?;
        if !matches!(app_url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "app_url must use http or https, got {}",
                app_url.scheme()
            )));
        }
        self.parsed_allowed_returns()?;

        if self.token.valid_duration_secs == 0 {
            return Err(ConfigError::Validation(
                "token.valid_duration_secs must be > 0".into(),
            ));
        }
        if self.flow_session_ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "flow_session_ttl_secs must be > 0".into(),
            ));
        }
        if self.cookie_name.is_empty() || self.flow_cookie_name.is_empty() {
            return Err(ConfigError::Validation("cookie names must not be empty".into()));
        }
        if self.cookie_name == self.flow_cookie_name {
            return Err(ConfigError::Validation(
                "cookie_name and flow_cookie_name must differ".into(),
            ));
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.id.is_empty() {
                return Err(ConfigError::Validation("provider id must not be empty".into()));
            }
            if !seen.insert(provider.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate provider id: {}",
                    provider.id
                )));
            }
            if provider.client_id.is_empty() || provider.client_secret.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "provider {} is missing client credentials",
                    provider.id
                )));
            }
            let overrides = [
                ("authorize_url", &provider.authorize_url),
                ("token_url", &provider.token_url),
                ("api_url", &provider.api_url),
            ];
            for (field, value) in overrides {
                if let Some(raw) = value {
                    parse_absolute(&format!("providers.{}.{field}", provider.id), raw)?;
                }
            }
        }

        Ok(())
    }
}

fn parse_absolute(field: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::Validation(format!("{field}: invalid URL {raw:?}: {e}")))?;
    if url.host_str().is_none() {
        return Err(ConfigError::Validation(format!(
            "{field}: URL {raw:?} has no host"
        )));
    }
    Ok(url)
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Environment variables override file values using the key path separated by
/// double underscores, e.g. `TOKEN__VALID_DURATION_SECS=3600`.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from("config.yaml")
}

pub fn load_config_from(path: &str) -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name(path))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

/// Convenience helper for binaries wanting panic-on-error behaviour.
pub fn load_config_or_panic() -> AppConfig {
    match load_config() {
        Ok(c) => c,
        Err(e) => panic!("Failed to load configuration: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            listen_addr: default_listen_addr(),
            database_url: None,
            app_url: "https://auth.example.com".into(),
            allowed_returns: vec!["https://app.example.com".into()],
            cookie_name: default_cookie_name(),
            flow_cookie_name: default_flow_cookie_name(),
            flow_session_ttl_secs: 600,
            token: TokenConfig {
                private_key: "priv".into(),
                public_key: "pub".into(),
                valid_duration_secs: 3600,
            },
            providers: vec![ProviderConfig {
                id: "github".into(),
                kind: ProviderKind::GitHub,
                client_id: "id".into(),
                client_secret: "secret".into(),
                authorize_url: None,
                token_url: None,
                api_url: None,
            }],
        }
    }

    #[test]
    fn accepts_valid_config() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn rejects_unparsable_provider_endpoint() {
        let mut cfg = base_config();
        cfg.providers[0].authorize_url = Some("github.com/login/oauth/authorize".into());
        match cfg.validate() {
            Err(ConfigError::Validation(msg)) => assert!(msg.contains("authorize_url"), "{msg}"),
            other => panic!("unexpected result: {other:?}"),
        }

        let mut cfg = base_config();
        cfg.providers[0].api_url = Some("not a url".into());
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));

        let mut cfg = base_config();
        cfg.providers[0].token_url = Some("http://127.0.0.1:9000/token".into());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_relative_app_url() {
        let mut cfg = base_config();
        cfg.app_url = "/auth".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_bad_allowed_return() {
        let mut cfg = base_config();
        cfg.allowed_returns.push("not a url".into());
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_duplicate_provider_ids() {
        let mut cfg = base_config();
        let dup = cfg.providers[0].clone();
        cfg.providers.push(dup);
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate provider id"));
    }

    #[test]
    fn rejects_zero_validity() {
        let mut cfg = base_config();
        cfg.token.valid_duration_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let cfg = base_config();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("secret\""));
        assert!(!rendered.contains("\"priv\""));
        assert!(rendered.contains("<redacted>"));
    }
}
