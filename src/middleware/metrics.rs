//! Request metrics
//!
//! Process-wide counters exposed in Prometheus text format.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

const KNOWN_METHODS: &[&str] = &[
    "GET", "HEAD", "POST", "PUT", "DELETE", "OPTIONS", "PATCH", "CONNECT", "TRACE",
];
const OTHER_METHOD: &str = "OTHER";

/// Methods outside the standard set are counted under `OTHER`.
fn method_label(method: &str) -> &str {
    if KNOWN_METHODS.contains(&method) {
        method
    } else {
        OTHER_METHOD
    }
}

#[derive(Debug, Default)]
pub struct Metrics {
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    by_method: DashMap<String, u64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, method: &str) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        *self
            .by_method
            .entry(method_label(method).to_string())
            .or_insert(0) += 1;
    }

    pub fn record_error(&self) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# HELP cdn_requests_total Total number of requests");
        let _ = writeln!(out, "# TYPE cdn_requests_total counter");
        let _ = writeln!(out, "cdn_requests_total {}", self.total_requests());
        let _ = writeln!(out, "# HELP cdn_errors_total Total number of errors");
        let _ = writeln!(out, "# TYPE cdn_errors_total counter");
        let _ = writeln!(out, "cdn_errors_total {}", self.total_errors());
        let _ = writeln!(out, "# HELP cdn_requests_by_method Requests by HTTP method");
        let _ = writeln!(out, "# TYPE cdn_requests_by_method counter");

        let mut methods: Vec<(String, u64)> = self
            .by_method
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        methods.sort();
        for (method, count) in methods {
            let _ = writeln!(out, "cdn_requests_by_method{{method=\"{method}\"}} {count}");
        }
        out
    }
}
