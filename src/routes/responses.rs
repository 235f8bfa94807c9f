//! Response helpers
//!
//! Fixed responses (preflight, health, metrics) and cookie handling shared by
//! the handlers.

use axum::Json;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::Utc;
use cookie::CookieBuilder;
use cookie::time::Duration as CookieDuration;
use serde::Serialize;
use serde_json::json;

use crate::auth::SESSION_COOKIE;
use crate::middleware::Metrics;

pub const ALLOWED_METHODS: &str = "GET, POST, DELETE, OPTIONS";
pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization";
const PREFLIGHT_MAX_AGE: &str = "86400";

pub fn json<T: Serialize>(status: StatusCode, body: T) -> Response {
    (status, Json(body)).into_response()
}

/// CORS preflight answer.
pub fn preflight() -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(PREFLIGHT_MAX_AGE),
    );
    response
}

pub fn healthz() -> Response {
    json(
        StatusCode::OK,
        json!({ "status": "healthy", "timestamp": Utc::now().to_rfc3339() }),
    )
}

pub fn metrics(metrics: &Metrics) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics.render(),
    )
        .into_response()
}

fn session_cookie_builder(value: String) -> CookieBuilder<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
}

/// Session cookie issued on login.
pub fn session_cookie(session_id: String, max_age_secs: u64) -> Cookie<'static> {
    let max_age = i64::try_from(max_age_secs).unwrap_or(i64::MAX);
    session_cookie_builder(session_id)
        .max_age(CookieDuration::seconds(max_age))
        .build()
}

/// Attaches a fresh session cookie to `response`.
pub fn with_session_cookie(response: Response, session_id: String, max_age_secs: u64) -> Response {
    let jar = CookieJar::new().add(session_cookie(session_id, max_age_secs));
    (jar, response).into_response()
}

/// Attaches an expired session cookie to `response`.
pub fn without_session_cookie(headers: &HeaderMap, response: Response) -> Response {
    let jar = CookieJar::from_headers(headers).remove(session_cookie_builder(String::new()).build());
    (jar, response).into_response()
}

/// Session id carried by the request, if any. An empty value counts as absent.
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value_trimmed().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie_headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn reads_session_among_other_cookies() {
        let headers = cookie_headers("theme=dark; session_id=abc123; lang=en");
        assert_eq!(session_id(&headers).as_deref(), Some("abc123"));
        assert_eq!(session_id(&HeaderMap::new()), None);
    }

    #[test]
    fn quoted_session_value_is_unquoted() {
        let headers = cookie_headers("session_id=\"abc123\"");
        assert_eq!(session_id(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn empty_session_value_is_absent() {
        assert_eq!(session_id(&cookie_headers("session_id=")), None);
    }

    #[test]
    fn issued_cookie_attributes() {
        let cookie = session_cookie("abc".to_string(), 86400);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(CookieDuration::seconds(86400)));

        let response = with_session_cookie(StatusCode::OK.into_response(), "abc".to_string(), 86400);
        let header = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(header.starts_with("session_id=abc"));
        assert!(header.contains("Max-Age=86400"));
        assert!(header.contains("Secure"));
    }

    #[test]
    fn logout_expires_presented_cookie() {
        let headers = cookie_headers("session_id=abc");
        let response = without_session_cookie(&headers, StatusCode::OK.into_response());
        let header = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(header.starts_with("session_id=;"));
        assert!(header.contains("Max-Age=0"));
    }

    #[test]
    fn preflight_allows_api_methods() {
        let response = preflight();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
            ALLOWED_METHODS
        );
        assert_eq!(response.headers()[header::ACCESS_CONTROL_MAX_AGE], "86400");
    }
}
