//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Update orchestrator (lifecycle events, catalog size)
//! - Catalog decoding
//! - Result window cache
//! - Downloads

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Update Metrics
// =============================================================================

/// Update events total by kind.
pub static UPDATE_EVENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediathek_update_events_total", "Total update lifecycle events"),
        &["event"], // "catalog_update_completed", "mirror_list_update_failed", ...
    )
    .unwrap()
});

/// Shows in the catalog after the last successful update.
pub static CATALOG_SHOWS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mediathek_catalog_shows",
        "Number of shows stored by the last catalog update",
    )
    .unwrap()
});

/// Decoded catalog bytes total.
pub static CATALOG_DECODED_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "mediathek_catalog_decoded_bytes_total",
        "Total bytes produced by the catalog decoder",
    )
    .unwrap()
});

// =============================================================================
// Result Window Metrics
// =============================================================================

/// Show cache lookups by result.
pub static CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediathek_cache_lookups_total", "Total show cache lookups"),
        &["result"], // "hit", "miss"
    )
    .unwrap()
});

// =============================================================================
// Download Metrics
// =============================================================================

/// Downloads finished total by result.
pub static DOWNLOADS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediathek_downloads_total", "Total downloads finished"),
        &["result"], // "completed", "failed", "cancelled"
    )
    .unwrap()
});

/// Downloaded bytes total.
pub static DOWNLOAD_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "mediathek_download_bytes_total",
        "Total bytes written by downloads",
    )
    .unwrap()
});

/// Download duration in seconds.
pub static DOWNLOAD_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("mediathek_download_duration_seconds", "Duration of downloads")
            .buckets(vec![1.0, 5.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0]),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Updates
        Box::new(UPDATE_EVENTS.clone()),
        Box::new(CATALOG_SHOWS.clone()),
        Box::new(CATALOG_DECODED_BYTES.clone()),
        // Result window
        Box::new(CACHE_LOOKUPS.clone()),
        // Downloads
        Box::new(DOWNLOADS_TOTAL.clone()),
        Box::new(DOWNLOAD_BYTES.clone()),
        Box::new(DOWNLOAD_DURATION.clone()),
    ]
}
