use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokendrop_types::constants;

use crate::state::AppState;

pub async fn handle_health() -> impl IntoResponse {
    tracing::trace!("health check: ok");
    Json(serde_json::json!({
        "status": "healthy",
        "service": constants::SERVICE_NAME,
        "version": constants::VERSION,
    }))
}

pub async fn handle_ready(State(state): State<AppState>) -> Response {
    let claims = state.service.claim_lock();
    let store_ok = match claims.health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Claim store health check failed");
            false
        }
    };
    let store = claims.store();
    let body = Json(serde_json::json!({
        "status": if store_ok { "ready" } else { "degraded" },
        "claimStore": store.backend_name(),
        "claimStoreDurable": store.is_durable(),
        "claimStoreOk": store_ok,
        "verifierMode": state.service.verifier_mode(),
    }));
    let status = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, body).into_response()
}
