//! Services module - the four directory-processing stages.
//!
//! Each stage is a small, framework-agnostic service that works on plain paths and reports
//! one [`ItemResult`] per unit of work (archive, file or directory). None of them know
//! about the GUI/CLI layer; progress leaves through a
//! [`ProgressObserver`](crate::pipeline::ProgressObserver) and cancellation arrives through a
//! [`StopSignal`](crate::pipeline::StopSignal).
//!
//! # Components
//!
//! - [`ArchiveExpander`]: unzips every `*.zip` under the root into a same-named directory
//!   and records it in the [`PendingArchiveSet`](crate::models::PendingArchiveSet)
//! - [`ContentRewriter`]: applies the ordered literal text substitutions to every file
//! - [`FileSwapper`]: replaces files whose name matches a configured key (copy-then-swap)
//! - [`ArchiveCollapser`]: zips every pending directory back and removes it
//!
//! # Failure model
//!
//! Per-item failures never abort a stage. They surface as [`ItemStatus::Skipped`] (with a
//! typed [`SkipReason`]) or [`ItemStatus::Failed`], and are logged with a severity that
//! matches how surprising they are: binary files are expected in real trees and only show
//! up at debug level.

pub mod collapse;
pub mod expand;
pub mod rewrite;
pub mod swap;
pub mod walk;

pub use collapse::ArchiveCollapser;
pub use expand::{ARCHIVE_EXTENSION, ArchiveExpander};
pub use rewrite::ContentRewriter;
pub use swap::FileSwapper;

use crate::models::PipelineStage;
use crate::pipeline::{ProgressObserver, StopSignal};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use thiserror::Error;

/// Severity of a reported item, mirrored onto the tracing level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// Why an item was skipped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("corrupt or unreadable archive: {0}")]
    CorruptArchive(String),

    #[error("target directory already exists: {0}")]
    TargetExists(Utf8PathBuf),

    #[error("file is not valid UTF-8 text")]
    NotText,

    #[error("permission denied")]
    PermissionDenied,
}

impl SkipReason {
    /// Skips that are routine in real trees and should not clutter the log
    pub fn is_expected(&self) -> bool {
        matches!(self, SkipReason::NotText | SkipReason::PermissionDenied)
    }
}

/// Status of a single unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    /// The item was changed as intended
    Processed,

    /// The main step succeeded but a follow-up step (deleting the source) failed
    ProcessedWithError(String),

    /// Nothing needed to change
    Unchanged,

    Skipped(SkipReason),

    Failed(String),
}

/// Result of processing one archive, file or directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemResult {
    pub path: Utf8PathBuf,
    pub status: ItemStatus,
    /// Human-readable status line
    pub message: String,
}

impl ItemResult {
    pub fn processed(path: impl Into<Utf8PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: ItemStatus::Processed,
            message: message.into(),
        }
    }

    pub fn processed_with_error(
        path: impl Into<Utf8PathBuf>,
        error: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            status: ItemStatus::ProcessedWithError(error.into()),
            message: message.into(),
        }
    }

    pub fn unchanged(path: impl Into<Utf8PathBuf>) -> Self {
        let path = path.into();
        let message = format!("No changes needed: {}", path);
        Self {
            path,
            status: ItemStatus::Unchanged,
            message,
        }
    }

    pub fn skipped(path: impl Into<Utf8PathBuf>, reason: SkipReason) -> Self {
        let path = path.into();
        let message = format!("Skipped {}: {}", path, reason);
        Self {
            path,
            status: ItemStatus::Skipped(reason),
            message,
        }
    }

    pub fn failed(path: impl Into<Utf8PathBuf>, error: impl Into<String>) -> Self {
        let path = path.into();
        let error = error.into();
        Self {
            message: error.clone(),
            path,
            status: ItemStatus::Failed(error),
        }
    }

    /// True when the intended change happened (with or without a follow-up error)
    pub fn is_processed(&self) -> bool {
        matches!(
            self.status,
            ItemStatus::Processed | ItemStatus::ProcessedWithError(_)
        )
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, ItemStatus::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, ItemStatus::Failed(_))
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match &self.status {
            ItemStatus::Skipped(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn severity(&self) -> Severity {
        match &self.status {
            ItemStatus::Processed => Severity::Info,
            ItemStatus::Unchanged => Severity::Debug,
            ItemStatus::Skipped(reason) if reason.is_expected() => Severity::Debug,
            ItemStatus::Skipped(SkipReason::TargetExists(_)) => Severity::Warning,
            ItemStatus::Skipped(_) | ItemStatus::Failed(_) | ItemStatus::ProcessedWithError(_) => {
                Severity::Error
            }
        }
    }

    /// Short status label used in events ("processed", "skipped", ...)
    pub fn status_label(&self) -> &'static str {
        match self.status {
            ItemStatus::Processed => "processed",
            ItemStatus::ProcessedWithError(_) => "processed_with_error",
            ItemStatus::Unchanged => "unchanged",
            ItemStatus::Skipped(_) => "skipped",
            ItemStatus::Failed(_) => "failed",
        }
    }

    /// Emit this result as a tracing record at its severity
    pub fn log(&self, stage: PipelineStage) {
        match self.severity() {
            Severity::Debug => tracing::debug!(%stage, path = %self.path, "{}", self.message),
            Severity::Info => tracing::info!(%stage, path = %self.path, "{}", self.message),
            Severity::Warning => tracing::warn!(%stage, path = %self.path, "{}", self.message),
            Severity::Error => tracing::error!(%stage, path = %self.path, "{}", self.message),
        }
    }
}

/// Everything a stage produced during one walk
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: PipelineStage,
    pub results: Vec<ItemResult>,
    /// The stop signal was observed before the walk finished
    pub cancelled: bool,
}

impl StageReport {
    pub fn new(stage: PipelineStage) -> Self {
        Self {
            stage,
            results: Vec::new(),
            cancelled: false,
        }
    }

    /// Number of items the stage actually visited
    pub fn visited(&self) -> usize {
        self.results.len()
    }

    pub fn processed(&self) -> usize {
        self.results.iter().filter(|r| r.is_processed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.results.iter().filter(|r| r.is_skipped()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.is_failed()).count()
    }

    pub fn result_for(&self, path: &Utf8Path) -> Option<&ItemResult> {
        self.results.iter().find(|r| r.path == path)
    }
}

/// Shared per-stage inputs: the cancellation token and the progress sink
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub stop: &'a StopSignal,
    pub observer: &'a dyn ProgressObserver,
}

impl<'a> StageContext<'a> {
    pub fn new(stop: &'a StopSignal, observer: &'a dyn ProgressObserver) -> Self {
        Self { stop, observer }
    }

    /// Run `process` over a snapshot of work items, polling the stop signal before each one.
    ///
    /// The in-flight item always finishes; the remaining ones are never visited once a stop
    /// has been requested.
    pub(crate) fn process_items<T, F>(
        &self,
        stage: PipelineStage,
        items: Vec<T>,
        mut process: F,
    ) -> StageReport
    where
        F: FnMut(T) -> ItemResult,
    {
        let mut report = StageReport::new(stage);
        let total = items.len();

        for item in items {
            if self.stop.is_stop_requested() {
                tracing::warn!(
                    "{} cancelled after {} of {} items",
                    stage,
                    report.visited(),
                    total
                );
                report.cancelled = true;
                break;
            }

            let result = process(item);
            result.log(stage);
            self.observer.item_processed(stage, &result);
            report.results.push(result);
        }

        report
    }
}
