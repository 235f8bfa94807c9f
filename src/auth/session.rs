//! Session management
//!
//! Authenticated sessions behind the `SessionStore` contract, with an
//! in-process implementation. Sessions expire after a period of inactivity;
//! every successful lookup pushes the deadline forward.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use rand::RngCore;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "session_id";

/// Default inactivity window.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    last_activity: Instant,
}

impl Session {
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }
}

/// Lookup contract for sessions, swappable for a shared store.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Starts a session for `username` and returns its id.
    async fn create(&self, username: &str) -> String;

    /// Returns the live session for `id` and refreshes its activity clock.
    /// Expired sessions are evicted and reported as absent.
    async fn get(&self, id: &str) -> Option<Session>;

    async fn destroy(&self, id: &str);

    /// Evicts every expired session, returning how many were removed.
    async fn sweep_expired(&self) -> usize;
}

/// 256-bit random token, hex encoded.
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Enough of a session id to correlate log lines without leaking it.
fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Process-local session store.
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    fn is_expired(&self, session: &Session, now: Instant) -> bool {
        now.duration_since(session.last_activity) > self.ttl
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, username: &str) -> String {
        let id = generate_session_id();
        let session = Session {
            id: id.clone(),
            username: username.to_string(),
            created_at: Utc::now(),
            last_activity: Instant::now(),
        };
        self.sessions.lock().await.insert(id.clone(), session);
        info!("Session {}... created for {}", short_id(&id), username);
        id
    }

    async fn get(&self, id: &str) -> Option<Session> {
        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();

        let expired = match sessions.get(id) {
            None => return None,
            Some(session) => self.is_expired(session, now),
        };
        if expired {
            sessions.remove(id);
            debug!("Session {}... expired", short_id(id));
            return None;
        }

        let session = sessions.get_mut(id)?;
        session.last_activity = now;
        Some(session.clone())
    }

    async fn destroy(&self, id: &str) {
        if self.sessions.lock().await.remove(id).is_some() {
            info!("Session {}... destroyed", short_id(id));
        }
    }

    async fn sweep_expired(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|_, session| !self.is_expired(session, now));
        let removed = before - sessions.len();
        if removed > 0 {
            info!("Swept {removed} expired sessions");
        }
        removed
    }
}
