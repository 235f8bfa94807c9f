//! RAX CDN Server
//!
//! Self-hosted image storage with a public CDN surface: authenticated asset
//! management, conditional caching, SVG sanitization and thumbnailing.

pub mod auth;
pub mod error;
pub mod media;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod storage;
pub mod utils;

pub use routes::build_router;
pub use server::{AppState, Server, ServerConfig};
