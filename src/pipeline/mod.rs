//! Pipeline controller.
//!
//! Runs the four stages in fixed order over one [`Configuration`]:
//!
//! 1. [`ArchiveExpander`]: unzip every archive and record the new directories
//! 2. [`ContentRewriter`]: apply text substitutions to every file
//! 3. [`FileSwapper`]: replace files by name
//! 4. [`ArchiveCollapser`]: rezip every recorded directory
//!
//! A stage transition only happens after the previous stage's walk completed. The
//! [`StopSignal`] is polled before the run, before every unit of work and after every
//! stage; once it is raised the in-flight item finishes, nothing else is touched and the
//! run reports [`PipelineOutcome::Cancelled`] for the stage in which the stop was seen,
//! with whatever is still expanded. There is no rollback.
//!
//! The pipeline itself is synchronous. Use [`PipelineHandle`] to run it on a tokio blocking
//! worker with a bounded join.

mod cancel;
mod handle;
mod observer;

pub use cancel::{StopHandle, StopSignal, stop_channel};
pub use handle::{JoinStatus, PipelineHandle};
#[cfg(test)]
pub use observer::MockProgressObserver;
pub use observer::{NoopObserver, ProgressObserver};

use crate::config::{ConfigError, ConfigLoader};
use crate::metrics::{RunMetrics, RunSummary};
use crate::models::{Configuration, PendingArchiveSet, PipelineStage};
use crate::services::{
    ArchiveCollapser, ArchiveExpander, ContentRewriter, FileSwapper, StageContext, StageReport,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// All four stages ran to the end. Archives that could not be rebuilt are listed in
    /// [`RunSummary::unresolved_archives`].
    Completed(RunSummary),

    /// The run could not start (configuration or root path problem); nothing was modified
    Failed { reason: String },

    /// A stop was requested. `pending` holds the directories that are still expanded.
    Cancelled {
        stage: PipelineStage,
        pending: Vec<Utf8PathBuf>,
    },
}

impl PipelineOutcome {
    /// Completed with every expanded archive rebuilt
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Completed(summary) if summary.is_clean())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineOutcome::Cancelled { .. })
    }

    /// Process exit code for this outcome
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineOutcome::Completed(summary) if summary.is_clean() => 0,
            PipelineOutcome::Completed(_) | PipelineOutcome::Failed { .. } => 1,
            PipelineOutcome::Cancelled { .. } => 130,
        }
    }
}

/// The single user-facing summary line
impl fmt::Display for PipelineOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineOutcome::Completed(summary) if summary.is_clean() => write!(
                f,
                "Processing completed successfully. Check the log file for details."
            ),
            PipelineOutcome::Completed(summary) => write!(
                f,
                "Processing completed with {} archive(s) left expanded. Check the log file for details.",
                summary.unresolved_archives.len()
            ),
            PipelineOutcome::Failed { reason } => write!(
                f,
                "An error occurred: {}. Check the log file for details.",
                reason
            ),
            PipelineOutcome::Cancelled { stage, .. } => write!(
                f,
                "Processing cancelled during {}. Check the log file for details.",
                stage
            ),
        }
    }
}

/// One configured run of the four stages
pub struct Pipeline {
    configuration: Configuration,
    expander: ArchiveExpander,
    rewriter: ContentRewriter,
    swapper: FileSwapper,
    collapser: ArchiveCollapser,
    observer: Arc<dyn ProgressObserver>,
}

impl Pipeline {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            expander: ArchiveExpander::new(),
            rewriter: ContentRewriter::new(configuration.text_substitutions.clone()),
            swapper: FileSwapper::new(configuration.file_substitutions.clone()),
            collapser: ArchiveCollapser::new(),
            configuration,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Load the main configuration document at `path` and build a pipeline from it.
    pub fn from_config_path(path: &Utf8Path) -> Result<Self, ConfigError> {
        let configuration = ConfigLoader::new(path).load()?;
        Ok(Self::new(configuration))
    }

    /// Attach a progress observer
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run all four stages, polling `stop` before each unit of work.
    pub fn run(&self, stop: &StopSignal) -> PipelineOutcome {
        let root = self.configuration.root_path.as_path();

        if let Err(e) = ConfigLoader::validate_root(root) {
            self.enter(PipelineStage::Failed);
            return PipelineOutcome::Failed {
                reason: e.to_string(),
            };
        }

        tracing::info!("Starting run on {}", root);
        let metrics = RunMetrics::new();
        let mut pending = PendingArchiveSet::new();
        let ctx = StageContext::new(stop, self.observer.as_ref());

        if stop.is_stop_requested() {
            return self.cancel(PipelineStage::Expanding, &pending, &metrics);
        }

        for stage in PipelineStage::WORK_STAGES {
            self.enter(stage);
            let started = Instant::now();

            let report = match stage {
                PipelineStage::Expanding => self.expander.expand_all(root, &mut pending, &ctx),
                PipelineStage::Rewriting => self.rewriter.rewrite_all(root, &ctx),
                PipelineStage::Swapping => self.swapper.swap_all(root, &ctx),
                PipelineStage::Collapsing => self.collapser.collapse_all(&mut pending, &ctx),
                _ => continue,
            };

            metrics.record_stage_time(stage, started.elapsed());
            Self::record_report(&metrics, &report);

            // A stop raised during the last item is still charged to this stage
            if report.cancelled || stop.is_stop_requested() {
                return self.cancel(stage, &pending, &metrics);
            }
        }

        for dir in pending.iter() {
            tracing::error!("Archive left expanded: {}", dir);
        }

        self.enter(PipelineStage::Done);
        metrics.log_summary();
        PipelineOutcome::Completed(metrics.summary(pending.to_vec()))
    }

    fn enter(&self, stage: PipelineStage) {
        tracing::info!("Stage: {}", stage);
        self.observer.stage_changed(stage);
    }

    fn record_report(metrics: &RunMetrics, report: &StageReport) {
        for result in &report.results {
            metrics.record_result(report.stage, result);
        }

        tracing::info!(
            "Finished {}: {} visited, {} processed, {} skipped, {} failed",
            report.stage,
            report.visited(),
            report.processed(),
            report.skipped(),
            report.failed()
        );
    }

    fn cancel(
        &self,
        stage: PipelineStage,
        pending: &PendingArchiveSet,
        metrics: &RunMetrics,
    ) -> PipelineOutcome {
        tracing::warn!(
            "Run cancelled during {}; {} archive(s) still expanded",
            stage,
            pending.len()
        );
        for dir in pending.iter() {
            tracing::warn!("Still expanded: {}", dir);
        }

        self.enter(PipelineStage::Cancelled);
        metrics.log_summary();
        PipelineOutcome::Cancelled {
            stage,
            pending: pending.to_vec(),
        }
    }
}

/// Load the configuration at `path` and run it.
///
/// Configuration problems become [`PipelineOutcome::Failed`] instead of an error, so a
/// front end only has one value to report.
pub fn run_from_config_path(
    path: &Utf8Path,
    stop: &StopSignal,
    observer: Arc<dyn ProgressObserver>,
) -> PipelineOutcome {
    match Pipeline::from_config_path(path) {
        Ok(pipeline) => pipeline.with_observer(observer).run(stop),
        Err(e) => {
            observer.stage_changed(PipelineStage::Failed);
            PipelineOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}
