//! Media processing
//!
//! SVG sanitization and raster thumbnailing for uploaded assets.

pub mod svg;
pub mod thumbnail;

pub use thumbnail::{THUMBNAIL_DIR, ThumbnailService};
