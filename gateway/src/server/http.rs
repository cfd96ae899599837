//! HTTP server implementation for the gateway.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tokio::signal;

use super::config::GatewayServerConfig;
use super::handlers::{
    AppState, handle_api, handle_health, handle_metrics, handle_not_found, handle_save,
};
use super::metrics::HttpMetrics;
use super::middleware::{trace_request, track_metrics};

/// Build the gateway router.
pub fn router(state: AppState, http_metrics: Arc<HttpMetrics>) -> Router {
    Router::new()
        .route("/save", post(handle_save))
        .route("/api", get(handle_api))
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .route_layer(middleware::from_fn_with_state(http_metrics, track_metrics))
        .fallback(handle_not_found)
        .layer(middleware::from_fn(trace_request))
        .with_state(state)
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    state: AppState,
    http_metrics: Arc<HttpMetrics>,
    config: GatewayServerConfig,
}

impl GatewayServer {
    /// Create a new gateway server.
    pub fn new(
        state: AppState,
        http_metrics: Arc<HttpMetrics>,
        config: GatewayServerConfig,
    ) -> Self {
        Self {
            state,
            http_metrics,
            config,
        }
    }

    /// Run the HTTP server until SIGINT or SIGTERM.
    pub async fn run(self) -> std::io::Result<()> {
        let app = router(self.state, self.http_metrics);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        tracing::info!("Starting gateway HTTP server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shut down gracefully");
        Ok(())
    }
}

/// Listen for SIGTERM (K8s pod termination) and SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
