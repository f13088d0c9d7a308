use crate::models::PipelineStage;
use crate::services::ItemResult;

/// Sink for pipeline progress.
///
/// Called synchronously from the worker thread, so implementations should be quick.
/// [`StateManager`](crate::state::StateManager) is the main implementation; it turns these calls
/// into broadcast [`StateChange`](crate::state::StateChange) events.
#[cfg_attr(test, mockall::automock)]
pub trait ProgressObserver: Send + Sync {
    /// The pipeline entered `stage`
    fn stage_changed(&self, stage: PipelineStage);

    /// One unit of work finished inside `stage`
    fn item_processed(&self, stage: PipelineStage, result: &ItemResult);
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn stage_changed(&self, _stage: PipelineStage) {}

    fn item_processed(&self, _stage: PipelineStage, _result: &ItemResult) {}
}
