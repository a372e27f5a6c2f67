/// Config schema types (ServiceNow OAuth client, HTTP gateway, token storage).
use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize, Serializer},
};

/// Only grant type the gateway drives.
pub const AUTHORIZATION_CODE: &str = "authorization_code";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SnowgateConfig {
    pub servicenow: ServiceNowConfig,
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
}

/// OAuth client settings for one ServiceNow instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceNowConfig {
    /// Instance host, e.g. `dev1234.service-now.com`. A full `http(s)://`
    /// origin is accepted too.
    pub domain: String,

    pub client_id: String,

    #[serde(serialize_with = "serialize_secret")]
    pub client_secret: Secret<String>,

    pub scope: String,

    pub grant_type: String,
}

impl Default for ServiceNowConfig {
    fn default() -> Self {
        Self {
            domain: "instance_name.service-now.com".into(),
            client_id: "your application client id".into(),
            client_secret: Secret::new("your application client secret".into()),
            scope: "useraccount".into(),
            grant_type: AUTHORIZATION_CODE.into(),
        }
    }
}

impl ServiceNowConfig {
    /// Origin of the instance, without a trailing slash.
    pub fn instance_url(&self) -> String {
        let domain = self.domain.trim().trim_end_matches('/');
        if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{domain}")
        }
    }

    pub fn authorization_url(&self) -> String {
        format!("{}/oauth_auth.do", self.instance_url())
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth_token.do", self.instance_url())
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind: String,
    pub port: u16,

    /// Externally reachable origin. Needed when the gateway sits behind a
    /// reverse proxy, since the callback URL registered with ServiceNow is
    /// derived from it.
    pub public_url: Option<String>,

    /// Header carrying the authenticated user id, set by a trusted fronting
    /// proxy. When unset the gateway issues its own identity cookie.
    pub user_header: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8787,
            public_url: None,
            user_header: None,
        }
    }
}

impl GatewayConfig {
    pub fn public_url(&self) -> String {
        match self.public_url.as_deref() {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.bind, self.port),
        }
    }

    /// Redirect URI registered with the OAuth provider.
    pub fn callback_url(&self) -> String {
        format!("{}/oauth/callback", self.public_url())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Memory,
}

/// Credential store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Token file for the `file` backend. Defaults to `~/.snowgate/oauth_tokens.json`.
    pub tokens_path: Option<PathBuf>,

    /// Lifetime of an issued authorization state nonce.
    pub state_ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            tokens_path: None,
            state_ttl_secs: 600,
        }
    }
}

impl StorageConfig {
    pub fn tokens_path(&self) -> PathBuf {
        self.tokens_path
            .clone()
            .unwrap_or_else(|| crate::loader::data_dir().join("oauth_tokens.json"))
    }
}

impl SnowgateConfig {
    /// Reject configurations the gateway cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.servicenow.domain.trim().is_empty() {
            anyhow::bail!("servicenow.domain must not be empty");
        }
        if self.servicenow.client_id.trim().is_empty() {
            anyhow::bail!("servicenow.client_id must not be empty");
        }
        if self.servicenow.grant_type != AUTHORIZATION_CODE {
            anyhow::bail!(
                "unsupported servicenow.grant_type `{}` (only `{AUTHORIZATION_CODE}`)",
                self.servicenow.grant_type
            );
        }
        if self.gateway.port == 0 {
            anyhow::bail!("gateway.port must not be 0");
        }
        Ok(())
    }
}

/// Serialize a secret in clear. Only for files the operator owns.
pub fn serialize_secret<S: Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

pub fn serialize_option_secret<S: Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
