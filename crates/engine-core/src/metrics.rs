use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    tables_written: AtomicU64,
    tables_empty: AtomicU64,
    tables_failed: AtomicU64,
    tables_skipped: AtomicU64,
    rows_written: AtomicU64,
    retry_count: AtomicU64,
}

/// Run-wide counters, shared between concurrently syncing tables.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub tables_written: u64,
    pub tables_empty: u64,
    pub tables_failed: u64,
    pub tables_skipped: u64,
    pub rows_written: u64,
    pub retry_count: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn record_written(&self, rows: u64) {
        self.inner.tables_written.fetch_add(1, Ordering::Relaxed);
        self.inner.rows_written.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn record_empty(&self) {
        self.inner.tables_empty.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.inner.tables_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.inner.tables_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_retries(&self, count: u64) {
        self.inner.retry_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tables_written: self.inner.tables_written.load(Ordering::Relaxed),
            tables_empty: self.inner.tables_empty.load(Ordering::Relaxed),
            tables_failed: self.inner.tables_failed.load(Ordering::Relaxed),
            tables_skipped: self.inner.tables_skipped.load(Ordering::Relaxed),
            rows_written: self.inner.rows_written.load(Ordering::Relaxed),
            retry_count: self.inner.retry_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let metrics = Metrics::new();
        let other = metrics.clone();

        metrics.record_written(10);
        other.record_written(5);
        other.record_empty();
        metrics.increment_retries(2);

        let snap = metrics.snapshot();
        assert_eq!(snap.tables_written, 2);
        assert_eq!(snap.rows_written, 15);
        assert_eq!(snap.tables_empty, 1);
        assert_eq!(snap.retry_count, 2);
    }
}
