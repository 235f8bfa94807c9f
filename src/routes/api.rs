//! Asset management API
//!
//! Listing and thumbnails are public; upload, mkdir, move, rename and delete
//! are only reached after the router's session and rate-limit checks.

use axum::body::Body;
use axum::extract::{FromRequest, Multipart, Query, Request};
use axum::extract::multipart::{Field, MultipartError};
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::Response;
use bytes::{Bytes, BytesMut};
use log::{debug, info};
use percent_encoding::{AsciiSet, CONTROLS, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::media::svg::validate_and_sanitize_bytes;
use crate::media::thumbnail::thumbnail_path;
use crate::routes::json_body;
use crate::routes::responses::json;
use crate::server::AppState;
use crate::storage::etag::{content_etag, matches_etag};
use crate::storage::validation::{extension_of, is_allowed_extension, is_raster_image};
use crate::storage::{FileInfo, StoragePath, read_to_bytes};
use crate::utils::validation::is_valid_segment;

const THUMBNAIL_CACHE_CONTROL: &str = "public, max-age=31536000";

/// Characters escaped inside a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'?')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Characters escaped in a query value, matching `encodeURIComponent`.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Default, Deserialize)]
struct PathQuery {
    #[serde(default)]
    path: String,
}

#[derive(Debug, Default, Deserialize)]
struct UploadQuery {
    #[serde(default)]
    path: String,
    #[serde(default)]
    overwrite: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MkdirRequest {
    #[serde(default)]
    path: String,
}

#[derive(Debug, Deserialize)]
struct MoveRequest {
    #[serde(default)]
    src: String,
    #[serde(default)]
    dst: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenameRequest {
    #[serde(default)]
    path: String,
    #[serde(default)]
    new_name: String,
}

/// Listing entry with its public URLs.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListItem {
    #[serde(flatten)]
    info: FileInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    path: String,
    items: Vec<ListItem>,
    total_size: u64,
    total_count: usize,
}

/// Public CDN URL of a stored file.
pub fn cdn_url(base_url: &str, path: &StoragePath) -> String {
    let encoded: Vec<String> = path
        .as_str()
        .split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect();
    format!("{base_url}/cdn/{}", encoded.join("/"))
}

/// Public thumbnail URL of a stored raster image.
pub fn thumbnail_url(base_url: &str, path: &StoragePath) -> String {
    format!(
        "{base_url}/api/thumbnail?path={}",
        utf8_percent_encode(path.as_str(), QUERY_COMPONENT)
    )
}

fn query<T: serde::de::DeserializeOwned>(uri: &Uri) -> Result<T, ApiError> {
    Query::<T>::try_from_uri(uri)
        .map(|Query(value)| value)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// GET /api/list?path=
pub async fn list(state: &AppState, uri: &Uri) -> Result<Response, ApiError> {
    let PathQuery { path } = query(uri)?;
    let dir = StoragePath::normalize(&path)?;
    let base_url = state.config.public_base_url();

    let items: Vec<ListItem> = state
        .storage
        .list(&dir)
        .await?
        .into_iter()
        .map(|info| {
            let (url, thumb_url) = match StoragePath::normalize(&info.path) {
                Ok(key) if info.is_file() => {
                    let thumb = is_raster_image(&info.name).then(|| thumbnail_url(base_url, &key));
                    (Some(cdn_url(base_url, &key)), thumb)
                }
                _ => (None, None),
            };
            ListItem {
                info,
                url,
                thumbnail_url: thumb_url,
            }
        })
        .collect();

    let total_size = items
        .iter()
        .filter(|item| item.info.is_file())
        .filter_map(|item| item.info.size)
        .sum();
    let total_count = items.len();

    Ok(json(
        StatusCode::OK,
        ListResponse {
            path: dir.as_str().to_string(),
            items,
            total_size,
            total_count,
        },
    ))
}

/// GET /api/thumbnail?path=
pub async fn thumbnail(state: &AppState, uri: &Uri, headers: &HeaderMap) -> Result<Response, ApiError> {
    let PathQuery { path } = query(uri)?;
    if path.trim().is_empty() {
        return Err(ApiError::BadRequest("Path required".into()));
    }
    let source = StoragePath::normalize(&path)?;

    let Some(info) = state.storage.stat(&source).await? else {
        return Err(ApiError::NotFound("Not Found".into()));
    };
    let generated = if info.is_file() {
        state.thumbnails.generate(&*state.storage, &source, &info.name).await
    } else {
        None
    };
    if generated.is_none() {
        return Err(ApiError::NotFound("Thumbnail not available".into()));
    }

    let bytes = read_to_bytes(&*state.storage, &thumbnail_path(&info.name)?).await?;
    let etag = content_etag(&bytes);
    let if_none_match = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok());

    let builder = Response::builder()
        .header(header::CACHE_CONTROL, THUMBNAIL_CACHE_CONTROL)
        .header(header::ETAG, &etag);
    let response = if matches_etag(&etag, if_none_match) {
        builder.status(StatusCode::NOT_MODIFIED).body(Body::empty())
    } else {
        builder
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "image/jpeg")
            .header(header::CONTENT_LENGTH, bytes.len())
            .body(Body::from(bytes))
    };
    response.map_err(|e| ApiError::Internal(format!("failed to build response: {e}")))
}

fn multipart_error(err: MultipartError, max_size: u64) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(max_size)
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// Buffers one multipart field, failing once it exceeds `max_size` bytes.
async fn read_field(mut field: Field<'_>, max_size: u64) -> Result<Bytes, ApiError> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, max_size))?
    {
        if (buffer.len() + chunk.len()) as u64 > max_size {
            return Err(ApiError::PayloadTooLarge(max_size));
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.freeze())
}

/// POST /api/upload?path=&overwrite=
pub async fn upload(state: &AppState, req: Request) -> Result<Response, ApiError> {
    let UploadQuery { path, overwrite } = query(req.uri())?;
    let overwrite = overwrite.as_deref() == Some("true");
    let max_size = state.config.max_upload_size;

    let mut multipart = Multipart::from_request(req, state)
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_size))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = read_field(field, max_size).await?;
        upload = Some((file_name, data));
        break;
    }
    let Some((file_name, data)) = upload else {
        return Err(ApiError::BadRequest("No file provided".into()));
    };

    // Only the final component of the client-supplied name is used.
    let name = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    if !is_allowed_extension(&name) {
        return Err(ApiError::BadRequest(
            "Only JPG, PNG, and SVG files are allowed".into(),
        ));
    }

    let target = StoragePath::normalize(&format!("{path}/{name}"))?;
    if target.is_root() {
        return Err(ApiError::BadRequest("No file provided".into()));
    }
    if !overwrite && state.storage.exists(&target).await? {
        return Err(ApiError::Conflict(
            "File already exists. Use overwrite=true to replace.".into(),
        ));
    }

    let size = data.len();
    if extension_of(&name).as_deref() == Some("svg") {
        let sanitized = tokio::task::spawn_blocking(move || validate_and_sanitize_bytes(&data))
            .await
            .map_err(|e| ApiError::Internal(format!("svg task failed: {e}")))??;
        state
            .storage
            .write(&target, Bytes::from(sanitized).into())
            .await?;
    } else {
        state.storage.write(&target, data.into()).await?;
        if state
            .thumbnails
            .generate(&*state.storage, &target, &name)
            .await
            .is_none()
        {
            debug!("No thumbnail for {}", target);
        }
    }

    info!("File uploaded: {} ({} bytes)", target, size);
    Ok(json(
        StatusCode::CREATED,
        json!({
            "success": true,
            "path": target.as_str(),
            "url": cdn_url(state.config.public_base_url(), &target),
        }),
    ))
}

/// POST /api/mkdir
pub async fn mkdir(state: &AppState, req: Request) -> Result<Response, ApiError> {
    let MkdirRequest { path } = json_body(state, req).await?;
    let dir = StoragePath::normalize(&path)?;
    if dir.is_root() {
        return Err(ApiError::BadRequest("Path required".into()));
    }
    if let Some(existing) = state.storage.stat(&dir).await? {
        if existing.is_file() {
            return Err(ApiError::Conflict("A file already exists at this path".into()));
        }
    }

    state.storage.mkdir(&dir).await?;
    Ok(json(
        StatusCode::CREATED,
        json!({ "success": true, "path": dir.as_str() }),
    ))
}

fn reject_root(path: &StoragePath, action: &str) -> Result<(), ApiError> {
    if path.is_root() {
        return Err(ApiError::InvalidPath(format!("cannot {action} the storage root")));
    }
    Ok(())
}

/// Moves `src` to `dst`, refusing to nest a directory inside itself.
async fn relocate(state: &AppState, src: &StoragePath, dst: &StoragePath) -> Result<(), ApiError> {
    if dst.as_str().starts_with(&format!("{}/", src.as_str())) {
        return Err(ApiError::BadRequest(
            "Cannot move a directory into itself".into(),
        ));
    }
    state.storage.move_path(src, dst).await?;
    Ok(())
}

/// POST /api/move
pub async fn move_entry(state: &AppState, req: Request) -> Result<Response, ApiError> {
    let MoveRequest { src, dst } = json_body(state, req).await?;
    if src.trim().is_empty() || dst.trim().is_empty() {
        return Err(ApiError::BadRequest("Source and destination required".into()));
    }
    let src = StoragePath::normalize(&src)?;
    let dst = StoragePath::normalize(&dst)?;
    reject_root(&src, "move")?;
    reject_root(&dst, "replace")?;

    relocate(state, &src, &dst).await?;
    Ok(json(
        StatusCode::OK,
        json!({ "success": true, "src": src.as_str(), "dst": dst.as_str() }),
    ))
}

/// POST /api/rename
pub async fn rename(state: &AppState, req: Request) -> Result<Response, ApiError> {
    let RenameRequest { path, new_name } = json_body(state, req).await?;
    if path.trim().is_empty() || new_name.trim().is_empty() {
        return Err(ApiError::BadRequest("Path and newName required".into()));
    }
    if !is_valid_segment(&new_name) {
        return Err(ApiError::BadRequest(
            "newName must be a single path segment".into(),
        ));
    }
    let src = StoragePath::normalize(&path)?;
    reject_root(&src, "rename")?;
    let dst = StoragePath::normalize(&format!("{}/{}", src.parent().as_str(), new_name))?;

    relocate(state, &src, &dst).await?;
    Ok(json(
        StatusCode::OK,
        json!({ "success": true, "path": dst.as_str() }),
    ))
}

/// DELETE /api/delete?path=
pub async fn delete(state: &AppState, uri: &Uri) -> Result<Response, ApiError> {
    let PathQuery { path } = query(uri)?;
    if path.trim().is_empty() {
        return Err(ApiError::BadRequest("Path required".into()));
    }
    let target = StoragePath::normalize(&path)?;
    reject_root(&target, "delete")?;

    let Some(info) = state.storage.stat(&target).await? else {
        return Err(ApiError::NotFound(format!("Not found: {target}")));
    };
    if info.is_file() {
        state.thumbnails.delete(&*state.storage, &info.name).await;
    }
    state.storage.delete(&target).await?;

    Ok(json(
        StatusCode::OK,
        json!({ "success": true, "path": target.as_str() }),
    ))
}
