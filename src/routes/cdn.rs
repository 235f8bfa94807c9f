//! CDN delivery
//!
//! Public, cache-friendly file serving with conditional GET support.
//! Range requests are acknowledged with 206 and `Content-Range`, but the
//! body is always the whole file.

use axum::body::Body;
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::Response;
use chrono::{DateTime, Utc};
use httpdate::{fmt_http_date, parse_http_date};
use log::debug;
use percent_encoding::percent_decode_str;

use crate::error::ApiError;
use crate::storage::etag::matches_etag;
use crate::storage::validation::extension_of;
use crate::storage::{FileInfo, StoragePath};
use crate::server::AppState;

pub const CACHE_CONTROL_IMMUTABLE: &str = "public, max-age=31536000, immutable";
const SVG_CONTENT_TYPE: &str = "image/svg+xml";
const SVG_CSP: &str = "default-src 'none'; style-src 'unsafe-inline'; img-src data:;";
const CDN_METHODS: &str = "GET, HEAD, OPTIONS";

/// Byte range requested by the client, clamped to the file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

/// Parses a single `bytes=start-[end]` range. Anything else, or a range
/// that starts past the end of the file, yields `None`.
pub fn parse_range(header: &str, size: u64) -> Option<ByteRange> {
    let spec = header.trim().strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start: u64 = start.trim().parse().ok()?;
    let last = size.checked_sub(1)?;
    let end = match end.trim() {
        "" => last,
        value => value.parse::<u64>().ok()?.min(last),
    };
    (start <= end).then_some(ByteRange { start, end })
}

fn header_str<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// True when the client's cached copy is still current.
fn is_not_modified(info: &FileInfo, headers: &HeaderMap) -> bool {
    if let Some(etag) = &info.etag {
        if matches_etag(etag, header_str(headers, header::IF_NONE_MATCH)) {
            return true;
        }
    }

    let since = header_str(headers, header::IF_MODIFIED_SINCE).and_then(|v| parse_http_date(v).ok());
    match (since, info.last_modified) {
        // HTTP dates carry whole seconds only.
        (Some(since), Some(modified)) => modified.timestamp() <= DateTime::<Utc>::from(since).timestamp(),
        _ => false,
    }
}

/// GET|HEAD /cdn/{path}
pub async fn serve(
    state: &AppState,
    raw_path: &str,
    method: &Method,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let decoded = percent_decode_str(raw_path)
        .decode_utf8()
        .map_err(|_| ApiError::InvalidPath("path is not valid UTF-8".into()))?;
    let path = StoragePath::normalize(&decoded)?;

    let Some(info) = state.storage.stat(&path).await? else {
        return Err(ApiError::NotFound("Not Found".into()));
    };
    if info.is_dir() {
        return Err(ApiError::BadRequest("Cannot serve directory".into()));
    }

    let last_modified = info.last_modified.map(|mtime| fmt_http_date(mtime.into()));

    if is_not_modified(&info, headers) {
        debug!("CDN {} not modified", path);
        let mut builder = Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .header(header::CACHE_CONTROL, CACHE_CONTROL_IMMUTABLE);
        if let Some(etag) = &info.etag {
            builder = builder.header(header::ETAG, etag);
        }
        if let Some(last_modified) = &last_modified {
            builder = builder.header(header::LAST_MODIFIED, last_modified);
        }
        return builder
            .body(Body::empty())
            .map_err(|e| ApiError::Internal(format!("failed to build response: {e}")));
    }

    let is_svg = extension_of(&info.name).as_deref() == Some("svg");
    let content_type = if is_svg {
        SVG_CONTENT_TYPE.to_string()
    } else {
        info.mime_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string())
    };
    let size = info.size.unwrap_or(0);

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, CACHE_CONTROL_IMMUTABLE)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, size)
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(header::ACCESS_CONTROL_ALLOW_METHODS, CDN_METHODS);
    if let Some(etag) = &info.etag {
        builder = builder.header(header::ETAG, etag);
    }
    if let Some(last_modified) = &last_modified {
        builder = builder.header(header::LAST_MODIFIED, last_modified);
    }
    if is_svg {
        builder = builder
            .header(header::CONTENT_SECURITY_POLICY, SVG_CSP)
            .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff");
    }

    let range = header_str(headers, header::RANGE).and_then(|value| parse_range(value, size));
    builder = match range {
        Some(range) => {
            debug!("CDN {} range {}-{} acknowledged with full body", path, range.start, range.end);
            builder.status(StatusCode::PARTIAL_CONTENT).header(
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", range.start, range.end, size),
            )
        }
        None => builder.status(StatusCode::OK),
    };

    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        Body::from_stream(state.storage.read(&path).await?)
    };

    builder
        .body(body)
        .map_err(|e| ApiError::Internal(format!("failed to build response: {e}")))
}
