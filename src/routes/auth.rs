//! Authentication routes
//!
//! Login, logout and session introspection, plus the session gate used by
//! protected routes.

use std::sync::Arc;

use axum::Json;
use axum::extract::{FromRequest, Request};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use log::{debug, info};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{Session, validate_login};
use crate::error::ApiError;
use crate::routes::responses::{json, session_id, with_session_cookie, without_session_cookie};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// POST /api/auth/login
pub async fn login(state: &AppState, req: Request) -> Result<Response, ApiError> {
    let Json(body) = Json::<LoginRequest>::from_request(req, state)
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let config = Arc::clone(&state.config);
    let username = body.username.clone();
    tokio::task::spawn_blocking(move || {
        validate_login(
            &body.username,
            &body.password,
            &config.admin_username,
            &config.admin_password_hash,
        )
    })
    .await
    .map_err(|e| ApiError::Internal(format!("login task failed: {e}")))??;

    let id = state.sessions.create(&username).await;
    info!("User {username} logged in");

    let response = json(
        StatusCode::OK,
        json!({ "success": true, "username": username }),
    );
    Ok(with_session_cookie(response, id, state.config.session_ttl_secs))
}

/// POST /api/auth/logout
pub async fn logout(state: &AppState, headers: &HeaderMap) -> Result<Response, ApiError> {
    if let Some(id) = session_id(headers) {
        state.sessions.destroy(&id).await;
    }

    let response = json(StatusCode::OK, json!({ "success": true }));
    Ok(without_session_cookie(headers, response))
}

/// GET /api/auth/me
pub async fn me(state: &AppState, headers: &HeaderMap) -> Result<Response, ApiError> {
    let Some(id) = session_id(headers) else {
        return Err(ApiError::Unauthorized("No session".into()));
    };
    match state.sessions.get(&id).await {
        Some(session) => Ok(json(
            StatusCode::OK,
            json!({ "username": session.username }),
        )),
        None => Err(ApiError::Unauthorized("Invalid session".into())),
    }
}

/// Resolves the caller's session or fails with 401.
pub async fn require_session(state: &AppState, headers: &HeaderMap) -> Result<Session, ApiError> {
    let session = match session_id(headers) {
        Some(id) => state.sessions.get(&id).await,
        None => None,
    };
    match session {
        Some(session) => {
            debug!("Authenticated request from {}", session.username);
            Ok(session)
        }
        None => Err(ApiError::Unauthorized("Authentication required".into())),
    }
}
