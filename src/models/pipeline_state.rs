use crate::services::ItemResult;
use camino::Utf8PathBuf;
use std::fmt;

/// Stages of a pipeline run.
///
/// A run moves `Idle → Expanding → Rewriting → Swapping → Collapsing → Done`. `Failed` and
/// `Cancelled` are terminal and can be entered from any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PipelineStage {
    #[default]
    Idle,
    Expanding,
    Rewriting,
    Swapping,
    Collapsing,
    Done,
    Failed,
    Cancelled,
}

impl PipelineStage {
    /// The four working stages in execution order
    pub const WORK_STAGES: [PipelineStage; 4] = [
        PipelineStage::Expanding,
        PipelineStage::Rewriting,
        PipelineStage::Swapping,
        PipelineStage::Collapsing,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineStage::Done | PipelineStage::Failed | PipelineStage::Cancelled
        )
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Expanding => "expanding archives",
            PipelineStage::Rewriting => "rewriting text",
            PipelineStage::Swapping => "replacing files",
            PipelineStage::Collapsing => "recompressing archives",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
            PipelineStage::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Observable state of the current (or last) pipeline run.
///
/// Wrapped in `Arc<RwLock<_>>` by [`StateManager`](crate::state::StateManager); front ends read
/// snapshots of it and subscribe to its change events instead of touching it directly.
#[derive(Clone, Debug, Default)]
pub struct PipelineState {
    pub stage: PipelineStage,
    pub is_running: bool,

    pub current_item: Option<Utf8PathBuf>,
    pub last_message: String,

    // Per-run counters
    pub processed_items: usize,
    pub unchanged_items: usize,
    pub skipped_items: usize,
    pub failed_items: usize,
}

impl PipelineState {
    /// Total number of items visited across all stages of this run
    pub fn visited_items(&self) -> usize {
        self.processed_items + self.unchanged_items + self.skipped_items + self.failed_items
    }

    /// Reset everything tied to a single run
    pub fn reset_run_state(&mut self) {
        self.stage = PipelineStage::Idle;
        self.is_running = false;
        self.current_item = None;
        self.last_message.clear();
        self.processed_items = 0;
        self.unchanged_items = 0;
        self.skipped_items = 0;
        self.failed_items = 0;
    }

    /// Fold one item result into the counters
    pub fn add_result(&mut self, result: &ItemResult) {
        if result.is_processed() {
            self.processed_items += 1;
        } else if result.is_skipped() {
            self.skipped_items += 1;
        } else if result.is_failed() {
            self.failed_items += 1;
        } else {
            self.unchanged_items += 1;
        }

        self.current_item = Some(result.path.clone());
        self.last_message = result.message.clone();
    }

    /// One-line summary of the counters
    pub fn summary(&self) -> String {
        format!(
            "{} processed, {} unchanged, {} skipped, {} failed",
            self.processed_items, self.unchanged_items, self.skipped_items, self.failed_items
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::SkipReason;

    #[test]
    fn test_work_stages_are_not_terminal() {
        assert!(
            PipelineStage::WORK_STAGES
                .iter()
                .all(|stage| !stage.is_terminal())
        );
        assert!(!PipelineStage::Idle.is_terminal());
        assert!(PipelineStage::Done.is_terminal());
        assert!(PipelineStage::Failed.is_terminal());
        assert!(PipelineStage::Cancelled.is_terminal());
    }

    #[test]
    fn test_add_result_counters() {
        let mut state = PipelineState::default();
        state.add_result(&ItemResult::processed("a.zip", "Unzipped a.zip"));
        state.add_result(&ItemResult::unchanged("b.txt"));
        state.add_result(&ItemResult::skipped("c.bin", SkipReason::NotText));
        state.add_result(&ItemResult::failed("d.dat", "boom"));

        assert_eq!(state.visited_items(), 4);
        assert_eq!(state.processed_items, 1);
        assert_eq!(state.failed_items, 1);
        assert_eq!(state.current_item, Some(Utf8PathBuf::from("d.dat")));
        assert_eq!(state.summary(), "1 processed, 1 unchanged, 1 skipped, 1 failed");
    }

    #[test]
    fn test_reset_run_state() {
        let mut state = PipelineState {
            stage: PipelineStage::Swapping,
            is_running: true,
            processed_items: 3,
            ..PipelineState::default()
        };

        state.reset_run_state();
        assert_eq!(state.stage, PipelineStage::Idle);
        assert!(!state.is_running);
        assert_eq!(state.visited_items(), 0);
    }
}
