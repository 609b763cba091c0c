use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-lifetime counters for the relay pipeline. Cheap enough to bump
/// on every request; snapshotted for /api/stats.
#[derive(Default)]
pub struct ProxyMetrics {
    requests_total: AtomicU64,
    relayed_ok: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    guard_rejections: AtomicU64,
    upstream_failures: AtomicU64,
    html_rewrites: AtomicU64,
    css_rewrites: AtomicU64,
    bytes_served: AtomicU64,
}

impl ProxyMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_relayed(&self, bytes: usize) {
        self.relayed_ok.fetch_add(1, Ordering::Relaxed);
        self.bytes_served.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_guard_rejection(&self) {
        self.guard_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_html_rewrite(&self) {
        self.html_rewrites.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_css_rewrite(&self) {
        self.css_rewrites.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            relayed_ok: self.relayed_ok.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            guard_rejections: self.guard_rejections.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            html_rewrites: self.html_rewrites.load(Ordering::Relaxed),
            css_rewrites: self.css_rewrites.load(Ordering::Relaxed),
            bytes_served: self.bytes_served.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub relayed_ok: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub guard_rejections: u64,
    pub upstream_failures: u64,
    pub html_rewrites: u64,
    pub css_rewrites: u64,
    pub bytes_served: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = ProxyMetrics::new();
        metrics.record_request();
        metrics.record_request();
        metrics.record_cache_hit();
        metrics.record_relayed(1024);

        let snap = metrics.snapshot();
        assert_eq!(snap.requests_total, 2);
        assert_eq!(snap.cache_hits, 1);
        assert_eq!(snap.bytes_served, 1024);
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = ProxyMetrics::new();
        metrics.record_guard_rejection();
        let json = serde_json::to_string(&metrics.snapshot()).unwrap();
        assert!(json.contains("\"guard_rejections\":1"));
    }
}
