//! Logging middleware
//!
//! Tags every request with an id, counts it, and logs its outcome.

use std::fmt;

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use log::{error, info, warn};
use tokio::time::Instant;
use uuid::Uuid;

use crate::server::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation id attached to each request and echoed in its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Self {
        Self(format!("req_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Records metrics, stamps the request id header and logs completion.
pub async fn track_request(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let started = Instant::now();
    let request_id = RequestId::generate();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    state.metrics.record_request(method.as_str());
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis();
    if status.is_server_error() {
        state.metrics.record_error();
        error!(
            "request_id={} method={} path={} status={} duration_ms={}",
            request_id,
            method,
            path,
            status.as_u16(),
            elapsed_ms
        );
    } else if status.is_client_error() {
        warn!(
            "request_id={} method={} path={} status={} duration_ms={}",
            request_id,
            method,
            path,
            status.as_u16(),
            elapsed_ms
        );
    } else {
        info!(
            "request_id={} method={} path={} status={} duration_ms={}",
            request_id,
            method,
            path,
            status.as_u16(),
            elapsed_ms
        );
    }

    response
}
