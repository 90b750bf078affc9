//! Tracing setup and per-request logging.

use std::time::Instant;

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use tokendrop_types::LogFormat;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation id attached to every request's extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Install the global subscriber. `RUST_LOG` filters, default `info`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

pub async fn request_id_middleware(mut req: Request<Body>, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map_or_else(|| Uuid::now_v7().to_string(), ToString::to_string);

    req.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

pub async fn logging_middleware(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    if matches!(path.as_str(), "/health" | "/ready") {
        tracing::trace!(target: "http", request_id, %method, path, status, duration_ms, "Health check");
    } else if response.status().is_server_error() {
        tracing::error!(target: "http", request_id, %method, path, status, duration_ms, "Request failed");
    } else if response.status().is_client_error() {
        tracing::warn!(target: "http", request_id, %method, path, status, duration_ms, "Request rejected");
    } else {
        tracing::debug!(target: "http", request_id, %method, path, status, duration_ms, "Request");
    }

    response
}
