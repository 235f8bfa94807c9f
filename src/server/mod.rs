//! Server core functionality
//!
//! This module contains the listener, configuration, and the shared state
//! every request handler works against.

pub mod config;
pub mod core;

use std::sync::Arc;

use crate::auth::{MemorySessionStore, SessionStore};
use crate::media::ThumbnailService;
use crate::middleware::{FixedWindowRateLimiter, Metrics, RateLimiter};
use crate::storage::{LocalStorage, StorageAdapter};

pub use self::config::{ServerConfig, StorageBackend};
pub use self::core::Server;

/// Shared handles passed to every request.
///
/// Sessions, rate limits and storage sit behind traits so a shared backend
/// can replace the in-process ones without touching the router.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub storage: Arc<dyn StorageAdapter>,
    pub sessions: Arc<dyn SessionStore>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub thumbnails: Arc<ThumbnailService>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Builds the in-process components described by `config`.
    pub fn from_config(config: ServerConfig) -> Self {
        let storage: Arc<dyn StorageAdapter> = match config.storage_type {
            StorageBackend::Local => Arc::new(LocalStorage::new(config.storage_root_path())),
        };
        let sessions = Arc::new(MemorySessionStore::new(config.session_ttl()));
        let rate_limiter = Arc::new(FixedWindowRateLimiter::new(
            config.rate_limit_requests,
            config.rate_limit_window(),
        ));
        let thumbnails = Arc::new(ThumbnailService::new(
            config.thumbnail_size,
            config.thumbnail_quality,
        ));

        Self {
            config: Arc::new(config),
            storage,
            sessions,
            rate_limiter,
            thumbnails,
            metrics: Arc::new(Metrics::new()),
        }
    }
}
