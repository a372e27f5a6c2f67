/// Boundary between the gateway and whatever drives the OAuth2 flow.
use {async_trait::async_trait, secrecy::Secret, serde::Deserialize};

/// Query parameters of the provider's redirect back to the callback URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("provider returned error `{error}`: {description}")]
    Provider { error: String, description: String },

    #[error("callback carries no state parameter")]
    MissingState,

    /// Unknown, expired, already consumed or issued to another user.
    #[error("no pending authorization matches the callback state")]
    StateMismatch,

    #[error("callback carries no authorization code")]
    MissingCode,

    #[error("token exchange failed: {0}")]
    Exchange(String),

    #[error("failed to persist tokens: {0}")]
    Storage(#[source] anyhow::Error),
}

/// OAuth2 Authorization Code client scoped per user.
#[async_trait]
pub trait OAuthClient: Send + Sync {
    /// URL of the provider's consent page for `user`. Stable while the
    /// user's pending authorization is alive.
    async fn authorization_url(&self, user: &str) -> anyhow::Result<String>;

    /// Whether `user` holds a usable token, refreshing it if needed.
    async fn has_access(&self, user: &str) -> bool;

    async fn access_token(&self, user: &str) -> anyhow::Result<Secret<String>>;

    /// Forget the user's token and any pending authorization.
    async fn reset(&self, user: &str) -> anyhow::Result<()>;

    /// Validate the redirect, exchange the code and persist the token.
    async fn handle_callback(
        &self,
        user: &str,
        params: &CallbackParams,
    ) -> Result<(), CallbackError>;
}
