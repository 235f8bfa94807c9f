//! Path validation
//!
//! Normalizes user-supplied paths into `StoragePath` keys and rejects any
//! input that would climb above the storage root.

use std::fmt;
use std::path::Path;

use crate::error::StorageError;

/// Extensions accepted for upload (lowercase, without the dot).
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "svg"];

/// A slash-separated key relative to the storage root.
///
/// Only `StoragePath::normalize` and `StoragePath::root` construct one, so any
/// value of this type has no `..` segment, no leading or trailing slash and
/// uses `/` as its only separator. The empty key is the root itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoragePath(String);

impl StoragePath {
    /// The storage root.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Lexically normalizes `input` and fails if the result escapes the root.
    ///
    /// Backslashes become slashes, empty and `.` segments are dropped and each
    /// `..` cancels the segment before it. Any `..` left over afterwards means
    /// the input tried to traverse above the root.
    pub fn normalize(input: &str) -> Result<Self, StorageError> {
        if input.contains('\0') {
            return Err(StorageError::InvalidPath("path contains a NUL byte".into()));
        }

        let unified = input.replace('\\', "/");
        let mut segments: Vec<&str> = Vec::new();

        for segment in unified.split('/') {
            match segment {
                "" | "." => {}
                ".." => match segments.last() {
                    Some(last) if *last != ".." => {
                        segments.pop();
                    }
                    _ => segments.push(".."),
                },
                name => segments.push(name),
            }
        }

        if segments.contains(&"..") {
            return Err(StorageError::InvalidPath(
                "directory traversal not allowed".into(),
            ));
        }

        Ok(Self(segments.join("/")))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last segment of the key, `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit('/').next()
    }

    /// Directory containing this key; the root is its own parent.
    pub fn parent(&self) -> StoragePath {
        match self.0.rfind('/') {
            Some(idx) => Self(self.0[..idx].to_string()),
            None => Self::root(),
        }
    }

    /// Lowercased extension of the last segment, if any.
    pub fn extension(&self) -> Option<String> {
        self.file_name().and_then(extension_of)
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Lowercased extension of a file name, without the dot.
pub fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Case-insensitive check against the upload allow-list.
pub fn is_allowed_extension(file_name: &str) -> bool {
    extension_of(file_name)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Raster formats the thumbnail pipeline understands.
pub fn is_raster_image(file_name: &str) -> bool {
    matches!(
        extension_of(file_name).as_deref(),
        Some("jpg") | Some("jpeg") | Some("png")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(input: &str) -> String {
        StoragePath::normalize(input).unwrap().as_str().to_string()
    }

    #[test]
    fn strips_leading_and_trailing_slashes() {
        assert_eq!(norm("/foo/bar/"), "foo/bar");
        assert_eq!(norm("foo/bar"), "foo/bar");
        assert_eq!(norm("///foo//bar///"), "foo/bar");
    }

    #[test]
    fn converts_backslashes() {
        assert_eq!(norm("foo\\bar"), "foo/bar");
        assert_eq!(norm("\\foo\\bar\\baz.png"), "foo/bar/baz.png");
    }

    #[test]
    fn collapses_dot_segments_inside_root() {
        assert_eq!(norm("foo/./bar"), "foo/bar");
        assert_eq!(norm("foo/baz/../bar"), "foo/bar");
        assert_eq!(norm("foo/.."), "");
    }

    #[test]
    fn rejects_traversal_after_normalization() {
        assert!(matches!(
            StoragePath::normalize("../etc/passwd"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            StoragePath::normalize("foo/../../bar"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(StoragePath::normalize("foo\\..\\..\\bar").is_err());
        assert!(StoragePath::normalize("/..").is_err());
    }

    #[test]
    fn dots_inside_names_are_not_traversal() {
        assert_eq!(norm("a..b.png"), "a..b.png");
        assert_eq!(norm(".../x"), ".../x");
    }

    #[test]
    fn rejects_nul_bytes() {
        assert!(StoragePath::normalize("foo\0bar").is_err());
    }

    #[test]
    fn empty_input_is_root() {
        let root = StoragePath::normalize("").unwrap();
        assert!(root.is_root());
        assert_eq!(StoragePath::normalize("/").unwrap(), StoragePath::root());
        assert_eq!(root.to_string(), "/");
    }

    #[test]
    fn normalized_output_never_has_edge_slashes_or_backslashes() {
        let inputs = ["a/b/", "/a\\b", "./a/./b/.", "a//b", "x/y/../z/"];
        for input in inputs {
            let path = norm(input);
            assert!(!path.starts_with('/'), "{input} -> {path}");
            assert!(!path.ends_with('/'), "{input} -> {path}");
            assert!(!path.contains('\\'), "{input} -> {path}");
        }
    }

    #[test]
    fn parent_and_file_name() {
        let path = StoragePath::normalize("photos/2024/cat.png").unwrap();
        assert_eq!(path.file_name(), Some("cat.png"));
        assert_eq!(path.parent().as_str(), "photos/2024");
        assert_eq!(path.extension().as_deref(), Some("png"));

        let top = StoragePath::normalize("cat.png").unwrap();
        assert!(top.parent().is_root());
        assert_eq!(StoragePath::root().file_name(), None);
    }

    #[test]
    fn allowed_extensions() {
        assert!(is_allowed_extension("image.jpg"));
        assert!(is_allowed_extension("image.jpeg"));
        assert!(is_allowed_extension("image.png"));
        assert!(is_allowed_extension("image.svg"));
        assert!(is_allowed_extension("image.JPG"));
        assert!(is_allowed_extension("image.PNG"));

        assert!(!is_allowed_extension("file.txt"));
        assert!(!is_allowed_extension("file.pdf"));
        assert!(!is_allowed_extension("file.exe"));
        assert!(!is_allowed_extension("noextension"));
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension_of("IMAGE.JPG").as_deref(), Some("jpg"));
        assert_eq!(extension_of("file.tar.gz").as_deref(), Some("gz"));
        assert!(is_raster_image("a.Jpeg"));
        assert!(!is_raster_image("a.svg"));
    }
}
