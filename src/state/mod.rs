// State management module
//
// This module provides the StateManager which wraps PipelineState with thread-safe access
// using Arc<RwLock<T>> and emits change events for front ends.

use crate::models::{PipelineStage, PipelineState};
use crate::pipeline::ProgressObserver;
use crate::services::{ItemResult, Severity};
use camino::Utf8PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Change events emitted when state is modified
///
/// These events notify interested parties (the CLI status printer, tests) about progress
/// without requiring them to poll the state.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// A run has started
    RunStarted,

    /// The pipeline moved to a new stage
    StageChanged { stage: PipelineStage },

    /// One unit of work finished
    ItemProcessed {
        stage: PipelineStage,
        path: Utf8PathBuf,
        status: String,
        severity: Severity,
        message: String,
    },

    /// The run has reached a terminal stage
    RunFinished {
        stage: PipelineStage,
        processed: usize,
        skipped: usize,
        failed: usize,
    },

    /// State has been reset
    StateReset,
}

/// Thread-safe state manager with event emission
///
/// - Provides thread-safe access to [`PipelineState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`StateChange`] events
/// - Supports subscribing to state changes via tokio broadcast channels
///
/// It implements [`ProgressObserver`], so attaching it to a
/// [`Pipeline`](crate::pipeline::Pipeline) is all that is needed to track a run.
///
/// # Usage
///
/// - [`read()`](Self::read) for reading single fields
/// - [`update()`](Self::update) for mutations with automatic event emission
/// - [`subscribe()`](Self::subscribe) for listening to state changes
pub struct StateManager {
    state: Arc<RwLock<PipelineState>>,

    /// Multiple subscribers can listen for state changes
    state_tx: broadcast::Sender<StateChange>,

    /// Item results below this severity update the counters but are not broadcast
    min_item_severity: Severity,
}

impl StateManager {
    /// Create a new StateManager with a broadcast buffer of 256 events.
    ///
    /// Only item results at [`Severity::Info`] or above are broadcast.
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(256);
        Self {
            state: Arc::new(RwLock::new(PipelineState::default())),
            state_tx,
            min_item_severity: Severity::Info,
        }
    }

    /// Broadcast item results at `severity` or above
    pub fn with_item_severity(mut self, severity: Severity) -> Self {
        self.min_item_severity = severity;
        self
    }

    /// Get a cloned snapshot of the current state
    pub fn snapshot(&self) -> PipelineState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let stage = state_manager.read(|state| state.stage);
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&PipelineState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// Captures the old state, applies `update_fn`, then emits one event per detected
    /// change. Returns the emitted events.
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut PipelineState),
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = Self::detect_changes(&old_state, &state);
        for change in &changes {
            self.emit(change.clone());
        }

        changes
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn emit(&self, change: StateChange) {
        // No subscribers is fine
        let _ = self.state_tx.send(change);
    }

    fn detect_changes(old: &PipelineState, new: &PipelineState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if !old.is_running && new.is_running {
            changes.push(StateChange::RunStarted);
        }

        if old.stage != new.stage {
            changes.push(StateChange::StageChanged { stage: new.stage });
        }

        if old.is_running && !new.is_running {
            changes.push(StateChange::RunFinished {
                stage: new.stage,
                processed: new.processed_items,
                skipped: new.skipped_items,
                failed: new.failed_items,
            });
        }

        changes
    }

    /// Record one item result and emit an [`StateChange::ItemProcessed`] event if it is
    /// severe enough to be broadcast
    pub fn add_item_result(&self, stage: PipelineStage, result: &ItemResult) -> Vec<StateChange> {
        let mut changes = self.update(|state| state.add_result(result));

        if result.severity() < self.min_item_severity {
            return changes;
        }

        let event = StateChange::ItemProcessed {
            stage,
            path: result.path.clone(),
            status: result.status_label().to_string(),
            severity: result.severity(),
            message: result.message.clone(),
        };
        self.emit(event.clone());
        changes.push(event);

        changes
    }

    /// Move to `stage`. Entering the first working stage starts a new run; entering a
    /// terminal stage ends it.
    pub fn set_stage(&self, stage: PipelineStage) -> Vec<StateChange> {
        self.update(|state| {
            if stage == PipelineStage::Expanding {
                state.reset_run_state();
                state.is_running = true;
            }
            if stage.is_terminal() {
                state.is_running = false;
                state.current_item = None;
            }
            state.stage = stage;
        })
    }

    /// Reset all run-related state
    pub fn reset(&self) -> Vec<StateChange> {
        let mut changes = self.update(PipelineState::reset_run_state);

        let event = StateChange::StateReset;
        self.emit(event.clone());
        changes.push(event);

        changes
    }
}

impl ProgressObserver for StateManager {
    fn stage_changed(&self, stage: PipelineStage) {
        self.set_stage(stage);
    }

    fn item_processed(&self, stage: PipelineStage, result: &ItemResult) {
        self.add_item_result(stage, result);
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
            min_item_severity: self.min_item_severity,
        }
    }
}
