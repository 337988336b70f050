//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the Mediathek server:
//! - HTTP request metrics (latency, counts)
//! - Result window and update status (collected dynamically)
//! - Core metrics re-registered from `mediathek_core::metrics`

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mediathek_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediathek_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mediathek_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Window and update status (collected dynamically)
// =============================================================================

/// Rows currently visible in the result window.
pub static WINDOW_ROWS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("mediathek_window_rows", "Rows visible in the result window").unwrap()
});

/// Shows matching the current query.
pub static WINDOW_TOTAL: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("mediathek_window_total", "Shows matching the current query").unwrap()
});

/// Shows held by the object cache.
pub static CACHE_ENTRIES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("mediathek_cache_entries", "Shows held by the object cache").unwrap()
});

/// Update cycle in flight (1) or idle (0).
pub static UPDATE_BUSY: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mediathek_update_busy",
        "Whether an update cycle is in flight (1) or not (0)",
    )
    .unwrap()
});

/// Active downloads gauge.
pub static DOWNLOADS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mediathek_downloads_active",
        "Number of currently running downloads",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Window and update
    registry.register(Box::new(WINDOW_ROWS.clone())).unwrap();
    registry.register(Box::new(WINDOW_TOTAL.clone())).unwrap();
    registry.register(Box::new(CACHE_ENTRIES.clone())).unwrap();
    registry.register(Box::new(UPDATE_BUSY.clone())).unwrap();
    registry
        .register(Box::new(DOWNLOADS_ACTIVE.clone()))
        .unwrap();

    // Core metrics (updates, decoding, cache lookups, downloads)
    for metric in mediathek_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    {
        let window = state.window().lock().await;
        WINDOW_ROWS.set(window.row_count() as i64);
        WINDOW_TOTAL.set(window.total() as i64);
        CACHE_ENTRIES.set(window.cache_len() as i64);
    }

    UPDATE_BUSY.set(if state.orchestrator().is_busy() { 1 } else { 0 });
    DOWNLOADS_ACTIVE.set(state.downloads().active_count().await as i64);
}

/// Normalize a path for metric labels (replace row and download ids with placeholders).
pub fn normalize_path(path: &str) -> String {
    let numeric_regex = regex_lite::Regex::new(r"/\d+(/|$)").unwrap();
    numeric_regex.replace_all(path, "/{id}$1").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_numeric() {
        assert_eq!(normalize_path("/api/v1/rows/12345"), "/api/v1/rows/{id}");
    }

    #[test]
    fn test_normalize_path_numeric_middle() {
        assert_eq!(
            normalize_path("/api/v1/rows/17/url"),
            "/api/v1/rows/{id}/url"
        );
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/api/v1/health"), "/api/v1/health");
        assert_eq!(normalize_path("/api/v1/sort/title"), "/api/v1/sort/title");
    }

    #[test]
    fn test_encode_includes_core_metrics() {
        mediathek_core::metrics::CATALOG_SHOWS.set(3);
        let text = encode_metrics();
        assert!(text.contains("mediathek_catalog_shows"));
        assert!(text.contains("mediathek_http_requests_in_flight"));
    }
}
