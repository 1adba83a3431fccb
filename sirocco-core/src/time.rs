//! Time helpers for authentication payloads and heartbeats.

use chrono::Utc;

/// Returns the current Unix timestamp in milliseconds.
#[must_use]
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Returns the current Unix timestamp in seconds.
#[must_use]
pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}
