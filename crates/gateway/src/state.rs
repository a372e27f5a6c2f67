use std::sync::Arc;

use {
    axum::http::HeaderMap,
    axum_extra::extract::cookie::CookieJar,
    snowgate_config::GatewayConfig,
};

use crate::{auth::IdentitySource, error::GatewayError, pages::Page, service::GatewayService};

/// Everything a request handler needs, shared behind an `Arc`.
pub struct GatewayState {
    pub service: GatewayService,
    pub identity: IdentitySource,
    /// Externally visible root of the gateway, with a trailing slash.
    pub entry_url: String,
    pub version: String,
}

impl GatewayState {
    pub fn new(service: GatewayService, gateway: &GatewayConfig) -> anyhow::Result<Arc<Self>> {
        let public_url = gateway.public_url();
        let identity = IdentitySource::from_config(
            gateway.user_header.as_deref(),
            public_url.starts_with("https://"),
        )?;
        Ok(Arc::new(Self {
            service,
            identity,
            entry_url: format!("{public_url}/"),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }))
    }

    pub fn identify(
        &self,
        headers: &HeaderMap,
        jar: CookieJar,
    ) -> Result<(CookieJar, String), GatewayError> {
        self.identity.identify(headers, jar)
    }

    pub fn render(&self, page: &Page) -> Result<String, GatewayError> {
        page.render(&self.entry_url)
            .map_err(|e| GatewayError::Internal(anyhow::anyhow!("failed to render page: {e}")))
    }
}
