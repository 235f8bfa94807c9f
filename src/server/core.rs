use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;

use crate::auth::SessionStore;
use crate::middleware::RateLimiter;
use crate::routes::build_router;
use crate::server::AppState;
use crate::server::config::ServerConfig;
use crate::storage::LocalStorage;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);
const RATE_LIMIT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct Server {
    listener: TcpListener,
    state: AppState,
}

impl Server {
    /// Prepares the storage root and binds the listener.
    pub async fn bind(config: ServerConfig) -> io::Result<Self> {
        let addr = config
            .socket_addr()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

        LocalStorage::new(config.storage_root_path())
            .ensure_root()
            .await
            .map_err(|e| io::Error::other(e.to_string()))?;

        if config.admin_password_hash.is_empty() {
            warn!("No admin password hash configured; logins will be refused");
        }

        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => {
                info!("Server bound to {}", addr);
                listener
            }
            Err(e) => {
                error!("Failed to bind to {}: {}", addr, e);
                return Err(e);
            }
        };

        Ok(Self {
            listener,
            state: AppState::from_config(config),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves requests until Ctrl+C or SIGTERM.
    pub async fn run(self) -> io::Result<()> {
        let config = Arc::clone(&self.state.config);
        info!(
            "Starting CDN server on {} (storage root {}, readonly: {})",
            self.listener.local_addr()?,
            config.storage_root,
            config.readonly
        );

        let sweepers = spawn_sweepers(
            Arc::clone(&self.state.sessions),
            Arc::clone(&self.state.rate_limiter),
        );
        let app = build_router(self.state);

        let result = axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        for task in sweepers {
            task.abort();
        }
        info!("Server stopped");
        result
    }
}

/// Periodic eviction of expired sessions and rate-limit windows.
fn spawn_sweepers(
    sessions: Arc<dyn SessionStore>,
    rate_limiter: Arc<dyn RateLimiter>,
) -> Vec<JoinHandle<()>> {
    let session_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = sessions.sweep_expired().await;
            debug!("Session sweep removed {removed} entries");
        }
    });

    let rate_limit_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            rate_limiter.sweep_expired().await;
        }
    });

    vec![session_task, rate_limit_task]
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received termination signal, shutting down");
}
