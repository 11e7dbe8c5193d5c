//! Metrics 模块
//!
//! Counters and timings emitted through the `metrics` facade. Nothing is
//! recorded unless the host installs a recorder.

use metrics::{counter, histogram};

pub const CACHE_LOOKUPS_TOTAL: &str = "credvault_cache_lookups_total";
pub const BACKEND_CALLS_TOTAL: &str = "credvault_backend_calls_total";
pub const BACKEND_CALL_DURATION_MS: &str = "credvault_backend_call_duration_ms";
pub const BACKEND_ERRORS_TOTAL: &str = "credvault_backend_errors_total";

/// 记录缓存查询
pub fn record_cache_lookup(hit: bool) {
    let labels = [("hit", hit.to_string())];
    counter!(CACHE_LOOKUPS_TOTAL, &labels).increment(1);
}

/// 记录后端调用
pub fn record_backend_call(operation: &'static str, duration_ms: f64, error_code: Option<&'static str>) {
    let labels = [
        ("operation", operation.to_string()),
        ("success", error_code.is_none().to_string()),
    ];
    counter!(BACKEND_CALLS_TOTAL, &labels).increment(1);
    histogram!(BACKEND_CALL_DURATION_MS, &labels).record(duration_ms);

    if let Some(code) = error_code {
        let labels = [("operation", operation.to_string()), ("code", code.to_string())];
        counter!(BACKEND_ERRORS_TOTAL, &labels).increment(1);
    }
}
