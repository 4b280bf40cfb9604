use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Global runtime metrics for the collector.
///
/// Purpose:
/// - Track passes run and ticks skipped
/// - Track request outcomes (sent / ok / failed)
/// - Track collected records
///
/// Design:
/// - Lock-free (Atomics)
/// - Cheap to update
/// - Only used for log output; run results come from `RunSummary`
#[derive(Default)]
pub struct RuntimeMetrics {
    // Scheduling
    pub passes_run: AtomicUsize,
    pub ticks_skipped: AtomicUsize,

    // Requests
    pub requests_sent: AtomicUsize,
    pub requests_ok: AtomicUsize,
    pub requests_failed: AtomicUsize,

    // Output
    pub records_collected: AtomicUsize,
}

impl RuntimeMetrics {
    /// One-line snapshot, e.g. for the end-of-pass log line.
    pub fn summary_line(&self) -> String {
        format!(
            "[METRICS] passes={} skipped_ticks={} sent={} ok={} failed={} records={}",
            self.passes_run.load(Ordering::Relaxed),
            self.ticks_skipped.load(Ordering::Relaxed),
            self.requests_sent.load(Ordering::Relaxed),
            self.requests_ok.load(Ordering::Relaxed),
            self.requests_failed.load(Ordering::Relaxed),
            self.records_collected.load(Ordering::Relaxed),
        )
    }
}

/// Global metrics registry (singleton)
pub static METRICS: Lazy<Arc<RuntimeMetrics>> =
    Lazy::new(|| Arc::new(RuntimeMetrics::default()));
