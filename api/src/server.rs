//! Axum server wiring.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::{broadcast, watch};
use tower_http::cors::CorsLayer;

use jamscan_store::BlockRecordStore;
use jamscan_sync::{EndpointRegistry, SyncMetrics, SyncStatus};
use jamscan_types::Timestamp;

use crate::error::ApiError;
use crate::handlers;

/// Everything the handlers read. Cheap to clone per request.
#[derive(Clone)]
pub struct ApiState {
    pub records: Arc<dyn BlockRecordStore + Send + Sync>,
    pub registry: Arc<EndpointRegistry>,
    pub status: watch::Receiver<SyncStatus>,
    pub now: watch::Receiver<Timestamp>,
    pub metrics: Arc<SyncMetrics>,
}

/// The HTTP API server.
pub struct ApiServer {
    port: u16,
    state: ApiState,
}

impl ApiServer {
    pub fn new(port: u16, state: ApiState) -> Self {
        Self { port, state }
    }

    /// The full route table; CORS is permissive so the browser UI can be
    /// served from anywhere.
    pub fn router(state: ApiState) -> Router {
        Router::new()
            .route("/status", get(handlers::get_status))
            .route("/blocks", get(handlers::list_blocks))
            .route("/blocks/:hash", get(handlers::get_block))
            .route("/reports", get(handlers::list_reports))
            .route("/endpoints", get(handlers::list_endpoints))
            .route("/endpoints/active", post(handlers::set_endpoint))
            .route("/metrics", get(handlers::get_metrics))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Serve until the shutdown signal fires.
    pub async fn start(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<(), ApiError> {
        let app = Self::router(self.state);
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| ApiError::Internal(format!("failed to bind {addr}: {e}")))?;
        tracing::info!(%addr, "http api listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))
    }
}
