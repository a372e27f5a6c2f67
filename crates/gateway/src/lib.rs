//! Gateway: HTTP front end for the ServiceNow OAuth2 Authorization Code flow.
//!
//! Lifecycle:
//! 1. Load + validate config
//! 2. Build the credential store and OAuth client
//! 3. Resolve the user identity source (trusted header or issued cookie)
//! 4. Serve the entry page, the OAuth callback and the demo API call
//!
//! The OAuth2 state machine itself lives behind `snowgate_oauth::OAuthClient`.

pub mod api;
pub mod auth;
pub mod error;
pub mod pages;
pub mod server;
pub mod service;
pub mod state;
