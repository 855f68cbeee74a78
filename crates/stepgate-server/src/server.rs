//! Router assembly and serving.
//!
//! Wires the engine together from configuration: secrets and token services
//! are created here, at startup, and injected into the engine. Nothing is
//! process-global, and everything is torn down with the process.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Json, Router, routing::get};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use stepgate_engine::{
    EngineConfig, FlowEngine, FlowState, InMemoryJtiStore, InMemorySessionStore, JtiStore,
    MockIdentityProvider, PROVIDER_ISSUER, SessionStore, SigningSecret, TokenService,
    VerifyResult, router as flow_router,
};

use crate::config::ServerConfig;

/// A fully wired application, ready to serve.
pub struct App {
    router: Router,
    addr: SocketAddr,
}

impl App {
    /// Builds the application from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid configuration (bad secrets, zero TTLs,
    /// unparseable bind address).
    pub fn build(config: ServerConfig) -> VerifyResult<Self> {
        config.engine.validate()?;

        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|_| {
                stepgate_engine::VerifyError::configuration("invalid bind host/port")
            })?;

        let router = build_router(&config.engine)?;
        Ok(Self { router, addr })
    }

    /// Returns the router, for tests that drive it without a listener.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Binds the listener and serves until ctrl-c.
    ///
    /// # Errors
    ///
    /// Returns an error if binding or serving fails.
    pub async fn run(self) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "stepgate listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

/// Builds the full router for the given engine configuration.
///
/// # Errors
///
/// Returns an error if a configured secret cannot be loaded.
pub fn build_router(engine_config: &EngineConfig) -> VerifyResult<Router> {
    let credential_secret = load_secret(engine_config.credential_secret.as_deref())?;
    let provider_secret = load_secret(engine_config.provider_secret.as_deref())?;

    let credentials = Arc::new(TokenService::new(
        &credential_secret,
        engine_config.issuer.clone(),
    ));
    let assertions = Arc::new(TokenService::new(&provider_secret, PROVIDER_ISSUER));

    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let jtis: Arc<dyn JtiStore> = Arc::new(InMemoryJtiStore::new());

    let engine = Arc::new(FlowEngine::new(
        engine_config.clone(),
        Arc::clone(&sessions),
        jtis,
        credentials,
        Arc::clone(&assertions),
    ));

    let mut state = FlowState::new(engine);
    if engine_config.mock_idp_enabled {
        let idp = Arc::new(MockIdentityProvider::new(
            sessions,
            assertions,
            engine_config.assertion_ttl,
            engine_config.issuer.clone(),
        ));
        state = state.with_mock_idp(idp);
        info!("mock identity provider enabled");
    }

    Ok(Router::new()
        .route("/healthz", get(healthz_handler))
        .merge(flow_router(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()))
}

/// Loads a secret from hex configuration, or generates a fresh one.
fn load_secret(hex_config: Option<&str>) -> VerifyResult<SigningSecret> {
    match hex_config {
        Some(hex_str) => SigningSecret::from_hex(hex_str),
        None => Ok(SigningSecret::generate()),
    }
}

/// `GET /healthz`
async fn healthz_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
