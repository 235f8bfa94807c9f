//! Error handlers
//!
//! Maps `ApiError` onto status codes and JSON error bodies.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use log::{debug, error, warn};
use serde_json::json;

use crate::error::types::ApiError;
use crate::middleware::logging::RequestId;

pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Convert error to HTTP status code
pub fn error_to_status(err: &ApiError) -> StatusCode {
    match err {
        ApiError::InvalidPath(_) => StatusCode::BAD_REQUEST,
        ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ApiError::UnsafeContent(_) => StatusCode::BAD_REQUEST,
        ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        ApiError::Conflict(_) => StatusCode::CONFLICT,
        ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
        ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Render an error as a JSON response and log it against the request id.
///
/// Internal errors get a generic message plus the request id so the client
/// can quote it; the underlying detail only goes to the log.
pub fn render_error(err: &ApiError, request_id: &RequestId) -> Response {
    let status = error_to_status(err);
    let label = status.canonical_reason().unwrap_or("Error");

    match err {
        ApiError::Internal(detail) => {
            error!("Request {request_id} failed: {detail}");
            let body = json!({
                "error": label,
                "message": "An unexpected error occurred",
                "requestId": request_id.as_str(),
            });
            (status, Json(body)).into_response()
        }
        ApiError::RateLimited {
            retry_after_secs,
            remaining,
        } => {
            warn!("Request {request_id} rate limited, retry after {retry_after_secs}s");
            let body = json!({
                "error": label,
                "message": err.to_string(),
                "retryAfter": retry_after_secs,
            });
            let mut response = (status, Json(body)).into_response();
            let headers = response.headers_mut();
            headers.insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
            headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(*remaining));
            response
        }
        _ => {
            debug!("Request {request_id} rejected with {}: {err}", status.as_u16());
            let body = json!({
                "error": label,
                "message": err.to_string(),
            });
            (status, Json(body)).into_response()
        }
    }
}
