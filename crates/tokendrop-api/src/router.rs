use std::net::SocketAddr;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use tokendrop_types::{TokendropError, constants};
use tokio::net::TcpListener;

use crate::cors::cors_middleware;
use crate::handlers::claim::handle_claim;
use crate::handlers::health::{handle_health, handle_ready};
use crate::handlers::rpc::handle_rpc_proxy;
use crate::logging::{logging_middleware, request_id_middleware};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/claim", post(handle_claim))
        .route("/api/airdrop", post(handle_claim))
        .route("/api/rpc", post(handle_rpc_proxy))
        .route("/health", get(handle_health))
        .route("/ready", get(handle_ready))
        .layer(DefaultBodyLimit::max(constants::MAX_REQUEST_BODY_BYTES))
        .layer(from_fn_with_state(state.clone(), cors_middleware))
        .layer(from_fn(logging_middleware))
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), TokendropError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| TokendropError::Internal(format!("bind {addr}: {e}")))?;
    tracing::info!(%addr, "HTTP server ready");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            tracing::error!(%addr, error = %e, "HTTP server terminated unexpectedly");
            TokendropError::Internal(e.to_string())
        })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
