//! Cross-origin policy.
//!
//! Every response carries the CORS headers. The allowed origin is echoed
//! back when it is on the allow-list; otherwise the first configured
//! origin is sent, which browsers then reject. Preflight `OPTIONS`
//! requests are answered with 204 before routing reaches a handler.

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL,
    ORIGIN, VARY,
};
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

const ALLOW_METHODS: &str = "POST,OPTIONS";
const ALLOW_HEADERS: &str = "content-type,solana-client";

/// Origin allow-list.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origins: Vec<String>,
}

impl CorsPolicy {
    #[must_use]
    pub fn new(origins: Vec<String>) -> Self {
        Self { origins }
    }

    /// Origin to send back for a request from `origin`.
    #[must_use]
    pub fn allow_origin<'a>(&'a self, origin: Option<&'a str>) -> &'a str {
        match origin {
            Some(o) if self.origins.iter().any(|allowed| allowed == o) => o,
            _ => self.origins.first().map_or("", String::as_str),
        }
    }

    pub fn apply(&self, headers: &mut HeaderMap, origin: Option<&str>) {
        if let Ok(value) = HeaderValue::from_str(self.allow_origin(origin)) {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(VARY, HeaderValue::from_static("origin"));
    }
}

pub async fn cors_middleware(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let origin = req
        .headers()
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let mut response = if req.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };
    state.cors.apply(response.headers_mut(), origin.as_deref());
    response
}
