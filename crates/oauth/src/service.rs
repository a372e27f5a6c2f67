//! [`OAuthClient`] implementation on top of the `oauth2` crate.

use std::{sync::Arc, time::Duration};

use {
    anyhow::Context,
    async_trait::async_trait,
    oauth2::{
        AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
        EndpointSet, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
        basic::{BasicClient, BasicTokenResponse},
    },
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, info, warn},
};

use crate::{
    client::{CallbackError, CallbackParams, OAuthClient},
    pending::PendingAuthorizations,
    storage::CredentialStore,
    types::{OAuthConfig, OAuthTokens, now_secs},
};

/// `BasicClient` with authorization and token endpoints set.
type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

pub struct OAuthService {
    config: OAuthConfig,
    oauth: ConfiguredClient,
    http: reqwest::Client,
    store: Arc<dyn CredentialStore>,
    pending: PendingAuthorizations,
}

impl OAuthService {
    pub fn new(
        config: OAuthConfig,
        store: Arc<dyn CredentialStore>,
        state_ttl: Duration,
    ) -> anyhow::Result<Self> {
        // ServiceNow reads client credentials from the form body.
        let oauth = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(
                config.client_secret.expose_secret().clone(),
            ))
            .set_auth_uri(AuthUrl::new(config.auth_url.clone()).context("invalid auth URL")?)
            .set_token_uri(TokenUrl::new(config.token_url.clone()).context("invalid token URL")?)
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_uri.clone()).context("invalid redirect URI")?,
            )
            .set_auth_type(AuthType::RequestBody);

        // Redirects on the token endpoint are never followed.
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("failed to build HTTP client for OAuth")?;

        Ok(Self {
            config,
            oauth,
            http,
            store,
            pending: PendingAuthorizations::new(state_ttl),
        })
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    async fn refresh(&self, user: &str, tokens: &OAuthTokens) -> anyhow::Result<OAuthTokens> {
        let refresh_token = tokens
            .refresh_token
            .as_ref()
            .context("no refresh token available")?;

        let response = self
            .oauth
            .exchange_refresh_token(&RefreshToken::new(
                refresh_token.expose_secret().clone(),
            ))
            .request_async(&self.http)
            .await
            .map_err(|e| anyhow::anyhow!("token refresh failed: {e}"))?;

        let fresh = tokens_from_response(&response, Some(refresh_token));
        self.store.save(user, &fresh)?;
        info!(user, "refreshed access token");
        Ok(fresh)
    }
}

/// Convert a token endpoint response. Providers may omit the refresh token
/// on refresh, in which case the previous one stays valid.
fn tokens_from_response(
    response: &BasicTokenResponse,
    previous_refresh: Option<&Secret<String>>,
) -> OAuthTokens {
    OAuthTokens {
        access_token: Secret::new(response.access_token().secret().clone()),
        refresh_token: response
            .refresh_token()
            .map(|t| Secret::new(t.secret().clone()))
            .or_else(|| previous_refresh.cloned()),
        expires_at: response.expires_in().map(|d| now_secs() + d.as_secs()),
        scope: response.scopes().map(|scopes| {
            scopes
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        }),
    }
}

#[async_trait]
impl OAuthClient for OAuthService {
    async fn authorization_url(&self, user: &str) -> anyhow::Result<String> {
        let state = self.pending.issue(user);
        let (url, _) = self
            .oauth
            .authorize_url(|| CsrfToken::new(state))
            .add_scopes(self.config.scopes.iter().map(|s| Scope::new(s.clone())))
            .url();
        Ok(url.to_string())
    }

    async fn has_access(&self, user: &str) -> bool {
        let Some(tokens) = self.store.load(user) else {
            return false;
        };
        if !tokens.is_expired() {
            return true;
        }
        if !tokens.has_refresh_token() {
            debug!(user, "access token expired and no refresh token stored");
            return false;
        }
        match self.refresh(user, &tokens).await {
            Ok(_) => true,
            Err(e) => {
                warn!(user, error = %e, "could not refresh access token");
                false
            },
        }
    }

    async fn access_token(&self, user: &str) -> anyhow::Result<Secret<String>> {
        if !self.has_access(user).await {
            anyhow::bail!("access not granted or expired");
        }
        self.store
            .load(user)
            .map(|t| t.access_token)
            .context("access not granted or expired")
    }

    async fn reset(&self, user: &str) -> anyhow::Result<()> {
        self.pending.discard(user);
        self.store.delete(user)?;
        info!(user, "oauth tokens reset");
        Ok(())
    }

    async fn handle_callback(
        &self,
        user: &str,
        params: &CallbackParams,
    ) -> Result<(), CallbackError> {
        if let Some(error) = params.error.as_deref() {
            return Err(CallbackError::Provider {
                error: error.to_string(),
                description: params.error_description.clone().unwrap_or_default(),
            });
        }

        let state = params
            .state
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(CallbackError::MissingState)?;
        if !self.pending.consume(user, state) {
            return Err(CallbackError::StateMismatch);
        }

        let code = params
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(CallbackError::MissingCode)?;

        let response = self
            .oauth
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| CallbackError::Exchange(e.to_string()))?;

        let tokens = tokens_from_response(&response, None);
        self.store
            .save(user, &tokens)
            .map_err(CallbackError::Storage)?;
        info!(user, expires_at = ?tokens.expires_at, "authorization code exchanged");
        Ok(())
    }
}
