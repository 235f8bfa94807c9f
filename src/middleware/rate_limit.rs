//! Rate limiting middleware
//!
//! Fixed-window request counting per client identifier, behind the
//! `RateLimiter` contract so the backing store can be swapped.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: Instant,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, rounded up, at least one.
    pub fn retry_after_secs(&self) -> u64 {
        let wait = self.reset_at.saturating_duration_since(Instant::now());
        let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
        secs.max(1)
    }
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, client_id: &str) -> RateLimitDecision;

    /// Drops windows that have already elapsed, returning how many.
    async fn sweep_expired(&self) -> usize;
}

#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    reset_at: Instant,
}

/// In-process fixed-window limiter.
pub struct FixedWindowRateLimiter {
    windows: Mutex<HashMap<String, RateLimitEntry>>,
    max_requests: u32,
    window: Duration,
}

impl FixedWindowRateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    pub async fn tracked_clients(&self) -> usize {
        self.windows.lock().await.len()
    }
}

#[async_trait]
impl RateLimiter for FixedWindowRateLimiter {
    async fn check(&self, client_id: &str) -> RateLimitDecision {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        let entry = windows
            .entry(client_id.to_string())
            .or_insert(RateLimitEntry {
                count: 0,
                reset_at: now + self.window,
            });
        if now >= entry.reset_at {
            *entry = RateLimitEntry {
                count: 0,
                reset_at: now + self.window,
            };
        }

        if entry.count >= self.max_requests {
            warn!("Rate limit exceeded for {client_id}");
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at: entry.reset_at,
            };
        }

        entry.count += 1;
        RateLimitDecision {
            allowed: true,
            remaining: self.max_requests - entry.count,
            reset_at: entry.reset_at,
        }
    }

    async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, entry| entry.reset_at > now);
        let removed = before - windows.len();
        if removed > 0 {
            debug!("Swept {removed} expired rate-limit windows");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn allows_max_then_denies() {
        let limiter = FixedWindowRateLimiter::new(3, WINDOW);
        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check("10.0.0.1").await;
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }
        let denied = limiter.check("10.0.0.1").await;
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.retry_after_secs(), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn clients_are_counted_separately() {
        let limiter = FixedWindowRateLimiter::new(1, WINDOW);
        assert!(limiter.check("a").await.allowed);
        assert!(!limiter.check("a").await.allowed);
        assert!(limiter.check("b").await.allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets_after_elapsing() {
        let limiter = FixedWindowRateLimiter::new(2, WINDOW);
        limiter.check("a").await;
        limiter.check("a").await;
        assert!(!limiter.check("a").await.allowed);

        tokio::time::advance(WINDOW).await;
        let decision = limiter.check("a").await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_rounds_up() {
        let limiter = FixedWindowRateLimiter::new(1, WINDOW);
        limiter.check("a").await;
        tokio::time::advance(Duration::from_millis(59_500)).await;
        assert_eq!(limiter.check("a").await.retry_after_secs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_elapsed_windows() {
        let limiter = FixedWindowRateLimiter::new(5, WINDOW);
        limiter.check("old").await;
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.check("new").await;
        tokio::time::advance(Duration::from_secs(31)).await;

        assert_eq!(limiter.sweep_expired().await, 1);
        assert_eq!(limiter.tracked_clients().await, 1);
    }
}
