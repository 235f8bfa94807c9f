//! Error types
//!
//! Defines domain-specific error types for each module of the CDN server and
//! the HTTP-facing `ApiError` they are all mapped onto at the handler boundary.

use std::fmt;
use std::io;

use thiserror::Error;

/// Storage module errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Authentication module errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("No admin password hash configured")]
    NotConfigured,

    #[error("Malformed password hash: {0}")]
    MalformedHash(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

/// Signature that made the SVG safety scan reject a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsafePattern {
    ScriptTag,
    EventHandler,
    JavascriptScheme,
    ScriptDataUrl,
}

impl fmt::Display for UnsafePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsafePattern::ScriptTag => write!(f, "script tag"),
            UnsafePattern::EventHandler => write!(f, "event handler attribute"),
            UnsafePattern::JavascriptScheme => write!(f, "javascript: URL"),
            UnsafePattern::ScriptDataUrl => write!(f, "data URL with script"),
        }
    }
}

/// SVG validation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SvgError {
    #[error("Invalid SVG: does not start with XML tag")]
    NotMarkup,

    #[error("Invalid SVG: content is not valid UTF-8")]
    NotUtf8,

    #[error("SVG contains potentially dangerous content ({0})")]
    Unsafe(UnsafePattern),
}

/// Thumbnail generation errors
#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Thumbnail task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Error taxonomy surfaced to HTTP clients.
///
/// Every handler returns `Result<Response, ApiError>`; the router renders the
/// error with `error::handlers::render_error`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    UnsafeContent(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("File size exceeds limit of {0} bytes")]
    PayloadTooLarge(u64),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Rate limit exceeded")]
    RateLimited { retry_after_secs: u64, remaining: u32 },

    /// Detail is logged, never sent to the client.
    #[error("{0}")]
    Internal(String),
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::InvalidPath(msg) => ApiError::InvalidPath(msg),
            StorageError::NotFound(path) => ApiError::NotFound(format!("Not found: {path}")),
            StorageError::NotADirectory(path) => {
                ApiError::BadRequest(format!("Not a directory: {path}"))
            }
            StorageError::Io(e) if e.kind() == io::ErrorKind::NotFound => {
                ApiError::NotFound("Not found".into())
            }
            StorageError::Io(e) => ApiError::Internal(format!("storage I/O failure: {e}")),
        }
    }
}

impl From<SvgError> for ApiError {
    fn from(error: SvgError) -> Self {
        ApiError::UnsafeContent(error.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::MalformedInput(msg) => ApiError::BadRequest(msg),
            AuthError::InvalidCredentials | AuthError::NotConfigured => {
                ApiError::Unauthorized("Invalid credentials".into())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}
