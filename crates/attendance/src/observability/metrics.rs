//! Metrics definitions for the attendance flow.
//!
//! All metrics follow Prometheus naming conventions:
//! - `attendance_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms

use metrics::{counter, histogram};
use std::time::Duration;

// ============================================================================
// Session Metrics
// ============================================================================

/// Record a session generation attempt.
///
/// Metric: `attendance_sessions_generated_total`
/// Labels: `outcome` (success, or an error code)
pub fn record_session_generated(outcome: &'static str) {
    counter!("attendance_sessions_generated_total", "outcome" => outcome).increment(1);
}

/// Record a countdown running out before the owner replaced it.
///
/// Metric: `attendance_countdown_expired_total`
/// Labels: none
pub fn record_countdown_expired() {
    counter!("attendance_countdown_expired_total").increment(1);
}

// ============================================================================
// Scan Metrics
// ============================================================================

/// Record a terminal scan outcome.
///
/// Metric: `attendance_scans_total`
/// Labels: `outcome` (`marked_present`, `already_checked_in`, or an error code)
pub fn record_scan_outcome(outcome: &'static str) {
    counter!("attendance_scans_total", "outcome" => outcome).increment(1);
}

// ============================================================================
// Backend Metrics
// ============================================================================

/// Record backend call latency.
///
/// Metric: `attendance_backend_latency_seconds`
/// Labels: `operation`, `status` (success, error)
///
/// Timeouts are recorded with the time spent waiting.
pub fn record_backend_latency(operation: &'static str, duration: Duration, success: bool) {
    let status = if success { "success" } else { "error" };
    histogram!(
        "attendance_backend_latency_seconds",
        "operation" => operation,
        "status" => status
    )
    .record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_session_generated() {
        record_session_generated("success");
        record_session_generated("validation");
        record_session_generated("generation_failed");
    }

    #[test]
    fn test_record_countdown_expired() {
        record_countdown_expired();
    }

    #[test]
    fn test_record_scan_outcome() {
        record_scan_outcome("marked_present");
        record_scan_outcome("already_checked_in");
        record_scan_outcome("format");
        record_scan_outcome("expired");
    }

    #[test]
    fn test_record_backend_latency() {
        record_backend_latency("create_attendance_session", Duration::from_millis(120), true);
        record_backend_latency("validate_and_record_attendance", Duration::from_millis(80), true);
        record_backend_latency("find_record", Duration::from_secs(15), false);
    }
}
