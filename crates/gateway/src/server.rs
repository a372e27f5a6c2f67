use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    axum::{
        Router,
        extract::{Query, State},
        http::HeaderMap,
        response::{Html, IntoResponse, Json},
        routing::{get, post},
    },
    axum_extra::extract::cookie::CookieJar,
    serde::Deserialize,
    snowgate_config::{SnowgateConfig, StorageBackend},
    snowgate_oauth::{
        CallbackParams, CredentialStore, FileTokenStore, MemoryTokenStore, OAuthService,
        oauth_config,
    },
    tower_http::trace::TraceLayer,
    tracing::{info, warn},
};

use crate::{
    api::ServiceNowApi,
    error::GatewayError,
    service::{Action, GatewayService},
    state::GatewayState,
};

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct AppState {
    gateway: Arc<GatewayState>,
}

#[derive(Debug, Deserialize)]
struct EntryQuery {
    action: Option<String>,
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: Arc<GatewayState>) -> Router {
    let app_state = AppState { gateway: state };

    Router::new()
        .route("/", get(entry_handler))
        .route("/oauth/callback", get(callback_handler))
        .route("/api/test", post(api_test_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Wire the credential store, OAuth client and demo API from config.
pub fn build_gateway_state(config: &SnowgateConfig) -> anyhow::Result<Arc<GatewayState>> {
    config.validate()?;

    let store: Arc<dyn CredentialStore> = match config.storage.backend {
        StorageBackend::File => Arc::new(FileTokenStore::with_path(config.storage.tokens_path())),
        StorageBackend::Memory => Arc::new(MemoryTokenStore::new()),
    };

    let oauth = OAuthService::new(
        oauth_config(&config.servicenow, &config.gateway),
        store,
        Duration::from_secs(config.storage.state_ttl_secs),
    )?;
    let api = ServiceNowApi::new(config.servicenow.instance_url());
    let service = GatewayService::new(Arc::new(oauth), api);

    GatewayState::new(service, &config.gateway)
}

/// Start the gateway HTTP server and serve until Ctrl-C.
pub async fn start_gateway(config: SnowgateConfig) -> anyhow::Result<()> {
    let state = build_gateway_state(&config)?;
    let app = build_gateway_app(Arc::clone(&state));

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    if config.servicenow.client_id == snowgate_config::ServiceNowConfig::default().client_id {
        warn!("servicenow.client_id is still the placeholder, edit snowgate.toml");
    }

    // Startup banner.
    let lines = [
        format!("snowgate v{}", state.version),
        format!("listening on {addr}"),
        format!("instance: {}", config.servicenow.instance_url()),
        format!("callback: {}", config.gateway.callback_url()),
        format!("storage: {:?}", config.storage.backend),
    ];
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutting down");
        })
        .await?;
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn entry_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(query): Query<EntryQuery>,
) -> Result<(CookieJar, Html<String>), GatewayError> {
    let (jar, user) = state.gateway.identify(&headers, jar)?;
    let action = Action::parse(query.action.as_deref());
    let page = state.gateway.service.route(&user, action).await?;
    Ok((jar, Html(state.gateway.render(&page)?)))
}

async fn callback_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Html<String>), GatewayError> {
    let (jar, user) = state.gateway.identify(&headers, jar)?;
    let page = state.gateway.service.callback(&user, &params).await;
    Ok((jar, Html(state.gateway.render(&page)?)))
}

async fn api_test_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, String), GatewayError> {
    let (jar, user) = state.gateway.identify(&headers, jar)?;
    let body = state.gateway.service.api_test(&user).await?;
    Ok((jar, body))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": state.gateway.version,
    }))
}
