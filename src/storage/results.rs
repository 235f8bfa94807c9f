//! Storage result types
//!
//! Defines the metadata structures returned by storage operations.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Kind of a storage entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// Metadata for a single file or directory
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub name: String,
    /// Normalized key relative to the storage root.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl FileInfo {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_camel_case_and_type_tag() {
        let info = FileInfo {
            name: "cat.png".into(),
            path: "photos/cat.png".into(),
            kind: EntryKind::File,
            size: Some(12),
            mime_type: Some("image/png".into()),
            last_modified: None,
            etag: Some("\"1-12\"".into()),
        };
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["type"], "file");
        assert_eq!(value["mimeType"], "image/png");
        assert_eq!(value["size"], 12);
        assert!(value.get("lastModified").is_none());
    }

    #[test]
    fn directories_omit_file_fields() {
        let info = FileInfo {
            name: "photos".into(),
            path: "photos".into(),
            kind: EntryKind::Directory,
            size: None,
            mime_type: None,
            last_modified: None,
            etag: None,
        };
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["type"], "directory");
        assert!(value.get("size").is_none());
        assert!(value.get("etag").is_none());
    }
}
