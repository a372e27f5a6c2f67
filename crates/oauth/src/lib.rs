pub mod client;
pub mod defaults;
pub mod pending;
pub mod service;
pub mod storage;
pub mod types;

pub use {
    client::{CallbackError, CallbackParams, OAuthClient},
    defaults::oauth_config,
    pending::PendingAuthorizations,
    service::OAuthService,
    storage::{CredentialStore, FileTokenStore, MemoryTokenStore},
    types::{OAuthConfig, OAuthTokens, now_secs},
};
