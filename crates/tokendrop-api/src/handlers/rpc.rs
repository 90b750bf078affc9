//! JSON-RPC pass-through to the ledger node, so browser clients never see
//! the node URL (and any API key embedded in it).

use std::time::Duration;

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Forwards raw JSON-RPC bodies to one upstream URL.
#[derive(Clone)]
pub struct RpcProxy {
    client: reqwest::Client,
    url: String,
}

impl RpcProxy {
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(UPSTREAM_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Returns the upstream status code and body.
    pub async fn forward(&self, body: Bytes) -> Result<(u16, Bytes), reqwest::Error> {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        Ok((status, bytes))
    }
}

/// `POST /api/rpc`
pub async fn handle_rpc_proxy(State(state): State<AppState>, body: Bytes) -> Response {
    let Some(proxy) = state.rpc.as_ref() else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "ok": false, "error": "rpc proxy disabled" })),
        )
            .into_response();
    };

    match proxy.forward(body).await {
        Ok((status, bytes)) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            let e = e.without_url();
            tracing::warn!(error = %e, "RPC upstream unreachable");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "ok": false, "error": format!("upstream error: {e}") })),
            )
                .into_response()
        }
    }
}
