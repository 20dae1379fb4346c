// src/metrics.rs
//! Service metrics tracking
//!
//! Simple atomic counters for fetch, persistence and request statistics,
//! exposed as a JSON snapshot on the stats endpoint.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Service metrics collector
#[derive(Default)]
pub struct ServiceMetrics {
    /// Successful manifest fetches from origin URLs
    manifest_fetches: AtomicU64,
    /// Failed manifest fetch or decode attempts
    manifest_errors: AtomicU64,
    /// Successful GitHub release fetches
    release_fetches: AtomicU64,
    /// Failed release fetch or decode attempts
    release_errors: AtomicU64,
    /// Records written through the store by a refresh job
    records_upserted: AtomicU64,
    /// Records removed by the expiry sweeper
    records_expired: AtomicU64,
    /// Successful debounced snapshot writes
    persist_writes: AtomicU64,
    /// Failed snapshot serializations or writes
    persist_errors: AtomicU64,
    /// Listing responses served from the version-keyed render cache
    listing_hits: AtomicU64,
    /// Listing responses that required a re-render
    listing_misses: AtomicU64,
    /// HTML page renders
    html_renders: AtomicU64,
    /// Search requests
    searches: AtomicU64,
    /// Release webhooks that scheduled a job
    webhooks_accepted: AtomicU64,
    /// Release webhooks for unregistered plugins
    webhooks_unknown: AtomicU64,
    /// Private plugin assets proxied to clients
    proxy_downloads: AtomicU64,
    /// Service start time
    start_time: std::sync::OnceLock<Instant>,
}

impl ServiceMetrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        let metrics = Self::default();
        let _ = metrics.start_time.set(Instant::now());
        metrics
    }

    pub fn record_manifest_fetch(&self) {
        self.manifest_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_manifest_error(&self) {
        self.manifest_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_release_fetch(&self) {
        self.release_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_release_error(&self) {
        self.release_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upserted(&self) {
        self.records_upserted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self) {
        self.records_expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persist_write(&self) {
        self.persist_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persist_error(&self) {
        self.persist_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_listing_hit(&self) {
        self.listing_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_listing_miss(&self) {
        self.listing_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_html_render(&self) {
        self.html_renders.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_search(&self) {
        self.searches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_webhook_accepted(&self) {
        self.webhooks_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_webhook_unknown(&self) {
        self.webhooks_unknown.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_proxy_download(&self) {
        self.proxy_downloads.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let uptime = self
            .start_time
            .get()
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO);

        let hits = self.listing_hits.load(Ordering::Relaxed);
        let misses = self.listing_misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let listing_hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        MetricsSnapshot {
            manifest_fetches: self.manifest_fetches.load(Ordering::Relaxed),
            manifest_errors: self.manifest_errors.load(Ordering::Relaxed),
            release_fetches: self.release_fetches.load(Ordering::Relaxed),
            release_errors: self.release_errors.load(Ordering::Relaxed),
            records_upserted: self.records_upserted.load(Ordering::Relaxed),
            records_expired: self.records_expired.load(Ordering::Relaxed),
            persist_writes: self.persist_writes.load(Ordering::Relaxed),
            persist_errors: self.persist_errors.load(Ordering::Relaxed),
            listing_hits: hits,
            listing_misses: misses,
            listing_hit_rate,
            html_renders: self.html_renders.load(Ordering::Relaxed),
            searches: self.searches.load(Ordering::Relaxed),
            webhooks_accepted: self.webhooks_accepted.load(Ordering::Relaxed),
            webhooks_unknown: self.webhooks_unknown.load(Ordering::Relaxed),
            proxy_downloads: self.proxy_downloads.load(Ordering::Relaxed),
            uptime_secs: uptime.as_secs(),
        }
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub manifest_fetches: u64,
    pub manifest_errors: u64,
    pub release_fetches: u64,
    pub release_errors: u64,
    pub records_upserted: u64,
    pub records_expired: u64,
    pub persist_writes: u64,
    pub persist_errors: u64,
    pub listing_hits: u64,
    pub listing_misses: u64,
    /// Render cache hit rate percentage
    pub listing_hit_rate: f64,
    pub html_renders: u64,
    pub searches: u64,
    pub webhooks_accepted: u64,
    pub webhooks_unknown: u64,
    pub proxy_downloads: u64,
    /// Service uptime in seconds
    pub uptime_secs: u64,
}
