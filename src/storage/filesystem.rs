//! Local disk storage
//!
//! `StorageAdapter` backed by a directory on the local file system.

use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::error::StorageError;
use crate::storage::etag::file_etag;
use crate::storage::results::{EntryKind, FileInfo};
use crate::storage::validation::{StoragePath, is_allowed_extension};
use crate::storage::{ByteStream, StorageAdapter, WritePayload};

/// Storage rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the root directory if it is missing.
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).await?;
        info!("Storage root ready at {}", self.root.display());
        Ok(())
    }

    fn resolve(&self, path: &StoragePath) -> PathBuf {
        if path.is_root() {
            self.root.clone()
        } else {
            self.root.join(path.as_str())
        }
    }

    async fn write_payload(target: &Path, payload: WritePayload) -> Result<(), StorageError> {
        let mut file = fs::File::create(target).await?;
        match payload {
            WritePayload::Buffered(bytes) => file.write_all(&bytes).await?,
            WritePayload::Streamed(mut stream) => {
                while let Some(chunk) = stream.next().await {
                    file.write_all(&chunk?).await?;
                }
            }
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}

/// Builds a `FileInfo` from file system metadata.
fn file_info(path: &StoragePath, metadata: &Metadata) -> FileInfo {
    let name = path.file_name().unwrap_or_default().to_string();
    let last_modified: Option<DateTime<Utc>> = metadata.modified().ok().map(DateTime::from);

    if metadata.is_dir() {
        return FileInfo {
            name,
            path: path.as_str().to_string(),
            kind: EntryKind::Directory,
            size: None,
            mime_type: None,
            last_modified,
            etag: None,
        };
    }

    let size = metadata.len();
    let mime_type = mime_guess::from_path(&name)
        .first()
        .map(|mime| mime.essence_str().to_string());
    let etag = match last_modified {
        Some(mtime) if is_allowed_extension(&name) => {
            Some(file_etag(mtime.timestamp_millis(), size))
        }
        _ => None,
    };

    FileInfo {
        name,
        path: path.as_str().to_string(),
        kind: EntryKind::File,
        size: Some(size),
        mime_type,
        last_modified,
        etag,
    }
}

fn not_found(path: &StoragePath) -> StorageError {
    StorageError::NotFound(path.to_string())
}

#[async_trait]
impl StorageAdapter for LocalStorage {
    async fn exists(&self, path: &StoragePath) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.resolve(path)).await?)
    }

    async fn read(&self, path: &StoragePath) -> Result<ByteStream, StorageError> {
        let file = match fs::File::open(self.resolve(path)).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found(path)),
            Err(e) => return Err(e.into()),
        };
        Ok(ReaderStream::new(file).boxed())
    }

    async fn write(&self, path: &StoragePath, payload: WritePayload) -> Result<(), StorageError> {
        let Some(name) = path.file_name() else {
            return Err(StorageError::InvalidPath("cannot write to the root".into()));
        };

        let target = self.resolve(path);
        let parent = self.resolve(&path.parent());
        fs::create_dir_all(&parent).await?;

        // Write beside the target then rename so readers never see a partial file.
        let temp = parent.join(format!(".{name}.{}.tmp", Uuid::new_v4().simple()));
        if let Err(e) = Self::write_payload(&temp, payload).await {
            if let Err(cleanup) = fs::remove_file(&temp).await {
                warn!("Failed to remove temp file {}: {}", temp.display(), cleanup);
            }
            error!("Failed to write {}: {}", path, e);
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            error!("Failed to move {} into place: {}", path, e);
            return Err(e.into());
        }

        debug!("Wrote {}", path);
        Ok(())
    }

    async fn delete(&self, path: &StoragePath) -> Result<(), StorageError> {
        let real = self.resolve(path);
        let metadata = match fs::symlink_metadata(&real).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found(path)),
            Err(e) => return Err(e.into()),
        };

        if metadata.is_dir() {
            fs::remove_dir_all(&real).await?;
        } else {
            fs::remove_file(&real).await?;
        }
        info!("Deleted {}", path);
        Ok(())
    }

    async fn list(&self, path: &StoragePath) -> Result<Vec<FileInfo>, StorageError> {
        let real = self.resolve(path);
        match fs::metadata(&real).await {
            Ok(metadata) if !metadata.is_dir() => {
                return Err(StorageError::NotADirectory(path.to_string()));
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        }

        let mut entries = fs::read_dir(&real).await?;

        let mut items = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            // Hidden entries cover the thumbnail cache and in-flight temp files.
            if name.starts_with('.') {
                continue;
            }
            let child = StoragePath::normalize(&format!("{}/{}", path.as_str(), name))?;
            match entry.metadata().await {
                Ok(metadata) => items.push(file_info(&child, &metadata)),
                Err(e) => warn!("Skipping {} in listing: {}", child, e),
            }
        }

        items.sort_by(|a, b| {
            b.is_dir()
                .cmp(&a.is_dir())
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(items)
    }

    async fn mkdir(&self, path: &StoragePath) -> Result<(), StorageError> {
        fs::create_dir_all(self.resolve(path)).await?;
        info!("Created directory {}", path);
        Ok(())
    }

    async fn move_path(&self, src: &StoragePath, dst: &StoragePath) -> Result<(), StorageError> {
        let from = self.resolve(src);
        if !fs::try_exists(&from).await? {
            return Err(not_found(src));
        }
        fs::create_dir_all(self.resolve(&dst.parent())).await?;
        fs::rename(&from, self.resolve(dst)).await?;
        info!("Moved {} to {}", src, dst);
        Ok(())
    }

    async fn stat(&self, path: &StoragePath) -> Result<Option<FileInfo>, StorageError> {
        match fs::metadata(self.resolve(path)).await {
            Ok(metadata) => Ok(Some(file_info(path, &metadata))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::read_to_bytes;
    use bytes::Bytes;
    use futures_util::stream;
    use tempfile::TempDir;

    fn key(path: &str) -> StoragePath {
        StoragePath::normalize(path).unwrap()
    }

    fn storage() -> (TempDir, LocalStorage) {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        (dir, storage)
    }

    #[tokio::test]
    async fn write_creates_parents_and_reads_back() {
        let (_dir, storage) = storage();
        let path = key("a/b/c.png");
        storage
            .write(&path, Bytes::from_static(b"png-bytes").into())
            .await
            .unwrap();

        assert!(storage.exists(&path).await.unwrap());
        let bytes = read_to_bytes(&storage, &path).await.unwrap();
        assert_eq!(&bytes[..], b"png-bytes");
    }

    #[tokio::test]
    async fn streamed_write_is_written_incrementally() {
        let (_dir, storage) = storage();
        let chunks = vec![
            Ok(Bytes::from_static(b"hello ")),
            Ok(Bytes::from_static(b"world")),
        ];
        let payload = WritePayload::Streamed(stream::iter(chunks).boxed());
        let path = key("greeting.svg");
        storage.write(&path, payload).await.unwrap();

        let bytes = read_to_bytes(&storage, &path).await.unwrap();
        assert_eq!(&bytes[..], b"hello world");
    }

    #[tokio::test]
    async fn failed_stream_leaves_no_file_behind() {
        let (dir, storage) = storage();
        let chunks = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::other("client went away")),
        ];
        let payload = WritePayload::Streamed(stream::iter(chunks).boxed());
        let path = key("broken.png");
        assert!(storage.write(&path, payload).await.is_err());

        assert!(!storage.exists(&path).await.unwrap());
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn list_orders_directories_first_and_hides_dot_entries() {
        let (_dir, storage) = storage();
        for file in ["b.png", "a.jpg", "Z.svg", ".hidden.png", ".thumbnails/a.jpg.thumb.jpg"] {
            storage.write(&key(file), Vec::from("x").into()).await.unwrap();
        }
        storage.mkdir(&key("zeta")).await.unwrap();
        storage.mkdir(&key("alpha")).await.unwrap();

        let names: Vec<String> = storage
            .list(&StoragePath::root())
            .await
            .unwrap()
            .into_iter()
            .map(|info| info.name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta", "Z.svg", "a.jpg", "b.png"]);
    }

    #[tokio::test]
    async fn list_of_missing_directory_is_empty() {
        let (_dir, storage) = storage();
        assert!(storage.list(&key("nope")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_of_file_is_an_error() {
        let (_dir, storage) = storage();
        storage.write(&key("a.png"), Vec::from("x").into()).await.unwrap();
        assert!(matches!(
            storage.list(&key("a.png")).await,
            Err(StorageError::NotADirectory(_))
        ));
    }

    #[tokio::test]
    async fn stat_reports_etag_only_for_images() {
        let (_dir, storage) = storage();
        storage.write(&key("pic.png"), Vec::from("1234").into()).await.unwrap();
        storage.write(&key("notes.txt"), Vec::from("1234").into()).await.unwrap();

        let image = storage.stat(&key("pic.png")).await.unwrap().unwrap();
        assert_eq!(image.size, Some(4));
        assert_eq!(image.mime_type.as_deref(), Some("image/png"));
        let etag = image.etag.unwrap();
        assert!(etag.ends_with("-4\""), "{etag}");

        let text = storage.stat(&key("notes.txt")).await.unwrap().unwrap();
        assert!(text.etag.is_none());

        assert!(storage.stat(&key("missing.png")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_directory_trees() {
        let (_dir, storage) = storage();
        storage.write(&key("dir/sub/a.png"), Vec::from("x").into()).await.unwrap();
        storage.delete(&key("dir")).await.unwrap();
        assert!(!storage.exists(&key("dir")).await.unwrap());

        assert!(matches!(
            storage.delete(&key("dir")).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn move_creates_destination_parents() {
        let (_dir, storage) = storage();
        storage.write(&key("a.png"), Vec::from("x").into()).await.unwrap();
        storage
            .move_path(&key("a.png"), &key("deep/er/b.png"))
            .await
            .unwrap();

        assert!(!storage.exists(&key("a.png")).await.unwrap());
        assert!(storage.exists(&key("deep/er/b.png")).await.unwrap());
    }

    #[tokio::test]
    async fn move_of_missing_source_is_not_found() {
        let (_dir, storage) = storage();
        assert!(matches!(
            storage.move_path(&key("ghost.png"), &key("b.png")).await,
            Err(StorageError::NotFound(_))
        ));
    }
}
