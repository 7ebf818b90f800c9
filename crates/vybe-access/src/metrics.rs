//! Access metrics for observability.
//!
//! # Metrics
//!
//! - `vybe_access_remote_calls_total` - Counter of remote calls by operation, status
//! - `vybe_access_remote_call_duration_seconds` - Histogram of remote call latencies
//! - `vybe_access_link_cache_total` - Counter of signed link cache lookups by outcome
//! - `vybe_access_fallbacks_total` - Counter of answers served from the local snapshot
//!
//! Metrics are recorded whenever a `metrics`-compatible recorder is
//! installed; without one they are no-ops.

use metrics::{counter, histogram};

/// Metric name for remote calls.
pub const REMOTE_CALLS_TOTAL: &str = "vybe_access_remote_calls_total";

/// Metric name for remote call duration histogram.
pub const REMOTE_CALL_DURATION_SECONDS: &str = "vybe_access_remote_call_duration_seconds";

/// Metric name for signed link cache lookups.
pub const LINK_CACHE_TOTAL: &str = "vybe_access_link_cache_total";

/// Metric name for snapshot fallbacks.
pub const FALLBACKS_TOTAL: &str = "vybe_access_fallbacks_total";

/// Remote call status for metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Timeout,
    Cancelled,
}

impl Status {
    /// Get the status as a string for metrics labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Record a finished (or abandoned) remote call.
pub fn record_remote_call(operation: &'static str, status: Status, duration_seconds: f64) {
    counter!(
        REMOTE_CALLS_TOTAL,
        "operation" => operation,
        "status" => status.as_str()
    )
    .increment(1);

    histogram!(REMOTE_CALL_DURATION_SECONDS, "operation" => operation).record(duration_seconds);
}

/// Record a signed link cache hit or miss.
pub fn record_link_lookup(hit: bool) {
    counter!(LINK_CACHE_TOTAL, "outcome" => if hit { "hit" } else { "miss" }).increment(1);
}

/// Record that a value came from the local snapshot instead of the backend.
///
/// `what` is `"session"` or `"admin"`.
pub fn record_fallback(what: &'static str) {
    counter!(FALLBACKS_TOTAL, "value" => what).increment(1);
}
