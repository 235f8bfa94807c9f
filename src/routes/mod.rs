//! Request routing
//!
//! A single entry point dispatches on method and path, applying the access
//! policy in a fixed order: preflight, health and metrics, public routes,
//! then readonly, session and rate-limit gates before protected handlers.

pub mod api;
pub mod auth;
pub mod cdn;
pub mod responses;

use axum::Json;
use axum::Router;
use axum::extract::{DefaultBodyLimit, FromRequest, Request, State};
use axum::http::Method;
use axum::middleware;
use axum::response::Response;
use log::debug;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::error::handlers::render_error;
use crate::middleware::{RequestId, track_request};
use crate::server::AppState;
use crate::utils::network::client_identifier;

/// Headroom on top of the upload cap for multipart framing.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Builds the application with request tracking and body limits applied.
pub fn build_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.max_upload_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .fallback(dispatch)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(state.clone(), track_request))
        .with_state(state)
}

async fn dispatch(State(state): State<AppState>, req: Request) -> Response {
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .cloned()
        .unwrap_or_else(RequestId::generate);
    debug!("request_id={} {} {}", request_id, req.method(), req.uri().path());

    match route(&state, req).await {
        Ok(response) => response,
        Err(err) => render_error(&err, &request_id),
    }
}

async fn route(state: &AppState, req: Request) -> Result<Response, ApiError> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if method == Method::OPTIONS {
        return Ok(responses::preflight());
    }

    match path.as_str() {
        "/healthz" => return Ok(responses::healthz()),
        "/metrics" if state.config.enable_metrics => {
            return Ok(responses::metrics(&state.metrics));
        }
        _ => {}
    }

    // Public routes
    if let Some(cdn_path) = path.strip_prefix("/cdn/") {
        return match method {
            Method::GET | Method::HEAD => cdn::serve(state, cdn_path, &method, req.headers()).await,
            _ => Err(not_found()),
        };
    }
    match (&method, path.as_str()) {
        (&Method::POST, "/api/auth/login") => return auth::login(state, req).await,
        (&Method::POST, "/api/auth/logout") => return auth::logout(state, req.headers()).await,
        (&Method::GET, "/api/auth/me") => return auth::me(state, req.headers()).await,
        (&Method::GET, "/api/list") => return api::list(state, req.uri()).await,
        (&Method::GET, "/api/thumbnail") => {
            return api::thumbnail(state, req.uri(), req.headers()).await;
        }
        _ => {}
    }
    if !path.starts_with("/api/") || path.starts_with("/api/auth/") {
        return Err(not_found());
    }

    // Protected routes
    if state.config.readonly && method != Method::GET {
        return Err(ApiError::Forbidden("Service is in read-only mode".into()));
    }
    auth::require_session(state, req.headers()).await?;
    if method != Method::GET {
        let client = client_identifier(req.headers());
        let decision = state.rate_limiter.check(&client).await;
        if !decision.allowed {
            return Err(ApiError::RateLimited {
                retry_after_secs: decision.retry_after_secs(),
                remaining: decision.remaining,
            });
        }
    }

    match (&method, path.as_str()) {
        (&Method::POST, "/api/upload") => api::upload(state, req).await,
        (&Method::POST, "/api/mkdir") => api::mkdir(state, req).await,
        (&Method::POST, "/api/move") => api::move_entry(state, req).await,
        (&Method::POST, "/api/rename") => api::rename(state, req).await,
        (&Method::DELETE, "/api/delete") => api::delete(state, req.uri()).await,
        _ => Err(not_found()),
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("Not Found".into())
}

/// Deserializes a JSON request body, mapping rejections to 400.
pub(crate) async fn json_body<T: DeserializeOwned>(state: &AppState, req: Request) -> Result<T, ApiError> {
    let Json(body) = Json::<T>::from_request(req, state)
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(body)
}
