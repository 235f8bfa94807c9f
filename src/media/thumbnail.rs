//! Thumbnail generation
//!
//! Bounded-size JPEG previews for raster uploads, cached in a hidden
//! directory under the storage root.

use std::io::Cursor;

use bytes::Bytes;
use image::ColorType;
use image::codecs::jpeg::JpegEncoder;
use log::{debug, info, warn};

use crate::error::{StorageError, ThumbnailError};
use crate::storage::validation::is_raster_image;
use crate::storage::{StorageAdapter, StoragePath, read_to_bytes};

/// Cache directory, relative to the storage root.
pub const THUMBNAIL_DIR: &str = ".thumbnails";

/// Cache key for the thumbnail of `file_name`: `<name>.thumb<.ext>`.
pub fn thumbnail_name(file_name: &str) -> String {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => format!("{}.thumb{}", file_name, &file_name[idx..]),
        _ => format!("{file_name}.thumb"),
    }
}

/// Storage key of the cached thumbnail for `file_name`.
pub fn thumbnail_path(file_name: &str) -> Result<StoragePath, StorageError> {
    StoragePath::normalize(&format!("{THUMBNAIL_DIR}/{}", thumbnail_name(file_name)))
}

/// Decodes `source`, shrinks it to fit a `max_dimension` square and encodes
/// the result as JPEG. Images already within bounds keep their size.
pub fn render_thumbnail(source: &[u8], max_dimension: u32, quality: u8) -> Result<Vec<u8>, ThumbnailError> {
    let mut image = image::load_from_memory(source)?;
    if image.width() > max_dimension || image.height() > max_dimension {
        image = image.thumbnail(max_dimension, max_dimension);
    }

    let rgb = image.to_rgb8();
    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, quality).encode(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ColorType::Rgb8,
    )?;
    Ok(buffer.into_inner())
}

#[derive(Debug, Clone)]
pub struct ThumbnailService {
    max_dimension: u32,
    quality: u8,
}

impl ThumbnailService {
    pub fn new(max_dimension: u32, quality: u8) -> Self {
        Self {
            max_dimension,
            quality,
        }
    }

    /// Returns the thumbnail name for `source`, creating it if missing.
    ///
    /// An existing thumbnail is reused as is. Failures are logged and yield
    /// `None`; they never fail the caller.
    pub async fn generate(
        &self,
        storage: &dyn StorageAdapter,
        source: &StoragePath,
        file_name: &str,
    ) -> Option<String> {
        if !is_raster_image(file_name) {
            return None;
        }
        match self.try_generate(storage, source, file_name).await {
            Ok(name) => Some(name),
            Err(e) => {
                warn!("Thumbnail generation failed for {}: {}", source, e);
                None
            }
        }
    }

    async fn try_generate(
        &self,
        storage: &dyn StorageAdapter,
        source: &StoragePath,
        file_name: &str,
    ) -> Result<String, ThumbnailError> {
        let name = thumbnail_name(file_name);
        let target = thumbnail_path(file_name)?;
        if storage.exists(&target).await? {
            debug!("Thumbnail cache hit for {}", source);
            return Ok(name);
        }

        let original = read_to_bytes(storage, source).await?;
        let (max_dimension, quality) = (self.max_dimension, self.quality);
        let encoded = tokio::task::spawn_blocking(move || {
            render_thumbnail(&original, max_dimension, quality)
        })
        .await
        .map_err(|e| ThumbnailError::Task(e.to_string()))??;

        storage.write(&target, Bytes::from(encoded).into()).await?;
        info!("Generated thumbnail {} for {}", name, source);
        Ok(name)
    }

    /// Best-effort removal of the cached thumbnail for `file_name`.
    pub async fn delete(&self, storage: &dyn StorageAdapter, file_name: &str) {
        let Ok(target) = thumbnail_path(file_name) else {
            return;
        };
        match storage.exists(&target).await {
            Ok(true) => {
                if let Err(e) = storage.delete(&target).await {
                    warn!("Failed to delete thumbnail {}: {}", target, e);
                }
            }
            Ok(false) => {}
            Err(e) => warn!("Failed to check thumbnail {}: {}", target, e),
        }
    }
}
