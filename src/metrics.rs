use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity.
#[derive(Default)]
pub struct PipelineMetrics {
    documents_processed: AtomicU64,
    pages_processed: AtomicU64,
    pages_flagged: AtomicU64,
    model_failures: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fully processed document and the number of pages it produced.
    pub fn record_document(&self, page_count: u64) {
        self.documents_processed.fetch_add(1, Ordering::Relaxed);
        self.pages_processed.fetch_add(page_count, Ordering::Relaxed);
    }

    /// Record a page that was flagged for image-level interpretation.
    pub fn record_flagged_page(&self) {
        self.pages_flagged.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a model call that failed and was replaced by a sentinel result.
    pub fn record_model_failure(&self) {
        self.model_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_processed: self.documents_processed.load(Ordering::Relaxed),
            pages_processed: self.pages_processed.load(Ordering::Relaxed),
            pages_flagged: self.pages_flagged.load(Ordering::Relaxed),
            model_failures: self.model_failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents processed since startup.
    pub documents_processed: u64,
    /// Total page records produced across all documents.
    pub pages_processed: u64,
    /// Pages routed through image-level interpretation.
    pub pages_flagged: u64,
    /// Model calls that degraded to sentinel results.
    pub model_failures: u64,
}
