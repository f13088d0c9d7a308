// Run metrics module
//
// Lightweight counters for one pipeline run, logged as a summary when the run ends

use crate::models::PipelineStage;
use crate::services::{ItemResult, ItemStatus};
use camino::Utf8PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters for a single pipeline run.
///
/// Uses atomic operations so observers on other threads can read them while the worker
/// records into them.
#[derive(Debug)]
pub struct RunMetrics {
    pub archives_expanded: AtomicUsize,
    pub files_rewritten: AtomicUsize,
    pub files_unchanged: AtomicUsize,
    pub files_replaced: AtomicUsize,
    pub archives_collapsed: AtomicUsize,

    pub items_skipped: AtomicUsize,
    pub items_failed: AtomicUsize,

    /// Items whose main step worked but whose cleanup step did not
    pub follow_up_errors: AtomicUsize,

    /// Wall time spent inside each working stage, in milliseconds
    pub expand_time_ms: AtomicU64,
    pub rewrite_time_ms: AtomicU64,
    pub swap_time_ms: AtomicU64,
    pub collapse_time_ms: AtomicU64,

    start_time: Instant,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            archives_expanded: AtomicUsize::new(0),
            files_rewritten: AtomicUsize::new(0),
            files_unchanged: AtomicUsize::new(0),
            files_replaced: AtomicUsize::new(0),
            archives_collapsed: AtomicUsize::new(0),
            items_skipped: AtomicUsize::new(0),
            items_failed: AtomicUsize::new(0),
            follow_up_errors: AtomicUsize::new(0),
            expand_time_ms: AtomicU64::new(0),
            rewrite_time_ms: AtomicU64::new(0),
            swap_time_ms: AtomicU64::new(0),
            collapse_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record the outcome of one item in `stage`
    pub fn record_result(&self, stage: PipelineStage, result: &ItemResult) {
        let counter = match &result.status {
            ItemStatus::Processed | ItemStatus::ProcessedWithError(_) => {
                if matches!(result.status, ItemStatus::ProcessedWithError(_)) {
                    self.follow_up_errors.fetch_add(1, Ordering::Relaxed);
                }
                match stage {
                    PipelineStage::Expanding => &self.archives_expanded,
                    PipelineStage::Rewriting => &self.files_rewritten,
                    PipelineStage::Swapping => &self.files_replaced,
                    PipelineStage::Collapsing => &self.archives_collapsed,
                    _ => return,
                }
            }
            ItemStatus::Unchanged => &self.files_unchanged,
            ItemStatus::Skipped(_) => &self.items_skipped,
            ItemStatus::Failed(_) => &self.items_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Add time spent in a working stage
    pub fn record_stage_time(&self, stage: PipelineStage, duration: Duration) {
        let counter = match stage {
            PipelineStage::Expanding => &self.expand_time_ms,
            PipelineStage::Rewriting => &self.rewrite_time_ms,
            PipelineStage::Swapping => &self.swap_time_ms,
            PipelineStage::Collapsing => &self.collapse_time_ms,
            _ => return,
        };
        counter.fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Snapshot the counters
    pub fn summary(&self, unresolved_archives: Vec<Utf8PathBuf>) -> RunSummary {
        RunSummary {
            archives_expanded: self.archives_expanded.load(Ordering::Relaxed),
            files_rewritten: self.files_rewritten.load(Ordering::Relaxed),
            files_unchanged: self.files_unchanged.load(Ordering::Relaxed),
            files_replaced: self.files_replaced.load(Ordering::Relaxed),
            archives_collapsed: self.archives_collapsed.load(Ordering::Relaxed),
            items_skipped: self.items_skipped.load(Ordering::Relaxed),
            items_failed: self.items_failed.load(Ordering::Relaxed),
            follow_up_errors: self.follow_up_errors.load(Ordering::Relaxed),
            elapsed: self.elapsed(),
            unresolved_archives,
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        let ms = |counter: &AtomicU64| counter.load(Ordering::Relaxed) as f64 / 1000.0;

        tracing::info!("=== Run Summary ===");
        tracing::info!("Elapsed: {:.2}s", self.elapsed().as_secs_f64());
        tracing::info!(
            "Archives: {} expanded, {} recompressed",
            self.archives_expanded.load(Ordering::Relaxed),
            self.archives_collapsed.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Files: {} rewritten, {} unchanged, {} replaced",
            self.files_rewritten.load(Ordering::Relaxed),
            self.files_unchanged.load(Ordering::Relaxed),
            self.files_replaced.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Problems: {} skipped, {} failed, {} follow-up errors",
            self.items_skipped.load(Ordering::Relaxed),
            self.items_failed.load(Ordering::Relaxed),
            self.follow_up_errors.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Stage time: expand {:.2}s, rewrite {:.2}s, replace {:.2}s, recompress {:.2}s",
            ms(&self.expand_time_ms),
            ms(&self.rewrite_time_ms),
            ms(&self.swap_time_ms),
            ms(&self.collapse_time_ms)
        );
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters of a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub archives_expanded: usize,
    pub files_rewritten: usize,
    pub files_unchanged: usize,
    pub files_replaced: usize,
    pub archives_collapsed: usize,
    pub items_skipped: usize,
    pub items_failed: usize,
    pub follow_up_errors: usize,
    pub elapsed: Duration,

    /// Expanded directories that could not be recompressed
    pub unresolved_archives: Vec<Utf8PathBuf>,
}

impl RunSummary {
    /// True when every expanded archive was rebuilt
    pub fn is_clean(&self) -> bool {
        self.unresolved_archives.is_empty()
    }
}
