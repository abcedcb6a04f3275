//! Axum HTTP server for probes and metrics

use std::net::SocketAddr;

use axum::{routing::get, Router};
use kube::Client;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{Error, Result};

use super::handlers;

/// State shared by the handlers
#[derive(Clone, Default)]
pub struct ServerState {
    /// Client used by the readiness probe; without one the probe always passes
    pub client: Option<Client>,
}

pub fn router(state: ServerState) -> Router {
    let router = Router::new()
        .route("/healthz", get(handlers::health))
        .route("/readyz", get(handlers::ready));

    #[cfg(feature = "metrics")]
    let router = router.route("/metrics", get(handlers::metrics));

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Run the probe and metrics server until the process exits
pub async fn run_server(addr: SocketAddr, state: ServerState) -> Result<()> {
    let app = router(state);

    info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::ConfigError(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::ConfigError(format!("Server error: {}", e)))?;

    Ok(())
}
