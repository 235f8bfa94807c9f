//! Entity tags
//!
//! Strong validators derived either from file metadata (mtime and size) or
//! from content, plus `If-None-Match` matching.

use sha2::{Digest, Sha256};

/// ETag from modification time and size: `"<mtime_ms>-<size>"`.
pub fn file_etag(mtime_millis: i64, size: u64) -> String {
    format!("\"{mtime_millis}-{size}\"")
}

/// ETag from the first 16 hex digits of the content's SHA-256.
pub fn content_etag(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let hex = hex::encode(digest);
    format!("\"{}\"", &hex[..16])
}

/// True if `if_none_match` lists `etag` or is `*`.
pub fn matches_etag(etag: &str, if_none_match: Option<&str>) -> bool {
    let Some(header) = if_none_match else {
        return false;
    };
    header.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate == etag || candidate.strip_prefix("W/") == Some(etag)
    })
}
