//! Server middleware
//!
//! Provides request tracking, metrics, and rate limiting.

pub mod logging;
pub mod metrics;
pub mod rate_limit;

pub use logging::{REQUEST_ID_HEADER, RequestId, track_request};
pub use metrics::Metrics;
pub use rate_limit::{FixedWindowRateLimiter, RateLimitDecision, RateLimiter};
