//! Object storage
//!
//! Defines the `StorageAdapter` contract every backend implements, plus the
//! path, metadata and ETag helpers shared by all of them.

pub mod etag;
pub mod filesystem;
pub mod results;
pub mod validation;

use std::io;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};

use crate::error::StorageError;

pub use filesystem::LocalStorage;
pub use results::{EntryKind, FileInfo};
pub use validation::StoragePath;

/// Chunked file content.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Content handed to `StorageAdapter::write`.
pub enum WritePayload {
    Buffered(Bytes),
    Streamed(ByteStream),
}

impl From<Bytes> for WritePayload {
    fn from(bytes: Bytes) -> Self {
        WritePayload::Buffered(bytes)
    }
}

impl From<Vec<u8>> for WritePayload {
    fn from(bytes: Vec<u8>) -> Self {
        WritePayload::Buffered(Bytes::from(bytes))
    }
}

/// Storage backend contract.
///
/// All paths are `StoragePath` keys, so implementations never see traversal
/// sequences. Hidden entries (leading `.`) are internal and never listed.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    async fn exists(&self, path: &StoragePath) -> Result<bool, StorageError>;

    async fn read(&self, path: &StoragePath) -> Result<ByteStream, StorageError>;

    /// Creates parent directories as needed and replaces any existing file.
    async fn write(&self, path: &StoragePath, payload: WritePayload) -> Result<(), StorageError>;

    /// Removes a file, or a directory with everything under it.
    async fn delete(&self, path: &StoragePath) -> Result<(), StorageError>;

    /// Directories first, then files, each group sorted by name.
    async fn list(&self, path: &StoragePath) -> Result<Vec<FileInfo>, StorageError>;

    async fn mkdir(&self, path: &StoragePath) -> Result<(), StorageError>;

    async fn move_path(&self, src: &StoragePath, dst: &StoragePath) -> Result<(), StorageError>;

    /// `Ok(None)` when nothing exists at `path`.
    async fn stat(&self, path: &StoragePath) -> Result<Option<FileInfo>, StorageError>;
}

/// Drains a read stream into memory.
pub async fn read_to_bytes(
    storage: &dyn StorageAdapter,
    path: &StoragePath,
) -> Result<Bytes, StorageError> {
    let mut stream = storage.read(path).await?;
    let mut buffer = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(buffer.freeze())
}
