//! Axum router and server.

use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::RpcError;
use crate::handlers;
use crate::state::AppState;

/// Build the full API router over the given state.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    // Body cap: payloads arrive hex-encoded (2x), plus JSON framing slack.
    let body_limit = state.settings.max_payload_bytes * 2 + 16 * 1024;

    Router::new()
        .route("/api/register_peer", post(handlers::register_peer))
        .route("/api/peers", get(handlers::list_peers))
        .route("/health", get(handlers::health))
        .route("/api/deliver", post(handlers::deliver))
        .route("/api/replicate", post(handlers::replicate))
        .route("/api/proposal", post(handlers::proposal))
        .route("/api/commit", post(handlers::commit))
        .route("/api/chain/tip", get(handlers::chain_tip))
        .route("/api/blocks", get(handlers::blocks))
        .route("/api/messages/:address", get(handlers::messages_for))
        .route("/api/conversation/:root_id", get(handlers::conversation))
        .route("/api/fetch/:cid", get(handlers::fetch_payload))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The HTTP API server, configured with a port and shared state.
pub struct RpcServer {
    pub port: u16,
    state: AppState,
}

impl RpcServer {
    pub fn new(port: u16, state: AppState) -> Self {
        Self { port, state }
    }

    /// Start serving. Runs until the server is shut down.
    pub async fn start(&self) -> Result<(), RpcError> {
        let app = build_router(self.state.clone());
        let addr = format!("0.0.0.0:{}", self.port);
        info!("RPC server listening on {addr}");
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| RpcError::Internal(format!("bind {addr}: {e}")))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| RpcError::Internal(e.to_string()))?;
        Ok(())
    }
}
