use {
    secrecy::Secret,
    snowgate_config::{GatewayConfig, ServiceNowConfig},
};

use crate::types::OAuthConfig;

const ENV_PREFIX: &str = "SNOWGATE_OAUTH_";

/// Build the OAuth client config for a ServiceNow instance.
///
/// Priority:
/// 1. Environment variables (`SNOWGATE_OAUTH_CLIENT_ID`, `..._CLIENT_SECRET`,
///    `..._AUTH_URL`, `..._TOKEN_URL`, `..._REDIRECT_URI`)
/// 2. The `[servicenow]` / `[gateway]` config sections
pub fn oauth_config(servicenow: &ServiceNowConfig, gateway: &GatewayConfig) -> OAuthConfig {
    let mut config = OAuthConfig {
        client_id: servicenow.client_id.clone(),
        client_secret: servicenow.client_secret.clone(),
        auth_url: servicenow.authorization_url(),
        token_url: servicenow.token_url(),
        redirect_uri: gateway.callback_url(),
        scopes: servicenow
            .scope
            .split_whitespace()
            .map(str::to_string)
            .collect(),
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    config
}

/// Override individual fields from `SNOWGATE_OAUTH_*` variables resolved through `lookup`.
pub fn apply_env_overrides(config: &mut OAuthConfig, lookup: impl Fn(&str) -> Option<String>) {
    let var = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));
    if let Some(v) = var("CLIENT_ID") {
        config.client_id = v;
    }
    if let Some(v) = var("CLIENT_SECRET") {
        config.client_secret = Secret::new(v);
    }
    if let Some(v) = var("AUTH_URL") {
        config.auth_url = v;
    }
    if let Some(v) = var("TOKEN_URL") {
        config.token_url = v;
    }
    if let Some(v) = var("REDIRECT_URI") {
        config.redirect_uri = v;
    }
}
