//! Integration tests for StateManager with state change events
//!
//! These tests verify that the StateManager correctly:
//! - Emits state change events while a pipeline runs
//! - Supports multiple subscribers
//! - Handles concurrent access from multiple threads
//! - Works with a pipeline running on a background worker

use bulkpatch::models::PipelineStage;
use bulkpatch::pipeline::{JoinStatus, PipelineHandle, ProgressObserver};
use bulkpatch::services::{ItemResult, Severity};
use bulkpatch::{Configuration, Pipeline, StateChange, StateManager};
use camino::Utf8PathBuf;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

async fn next_event(rx: &mut broadcast::Receiver<StateChange>) -> StateChange {
    timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed")
}

/// Drain every event currently queued
fn drain(rx: &mut broadcast::Receiver<StateChange>) -> Vec<StateChange> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_run_started_event_emitted() {
    let state = Arc::new(StateManager::new());
    let mut rx = state.subscribe();

    state.set_stage(PipelineStage::Expanding);

    let event = next_event(&mut rx).await;
    assert_eq!(event, StateChange::RunStarted);

    let event = next_event(&mut rx).await;
    assert!(
        matches!(
            event,
            StateChange::StageChanged {
                stage: PipelineStage::Expanding
            }
        ),
        "Expected StageChanged event, got: {:?}",
        event
    );
}

#[tokio::test]
async fn test_multiple_subscribers_receive_item_events() {
    let state = Arc::new(StateManager::new());
    let mut rx1 = state.subscribe();
    let mut rx2 = state.subscribe();

    state.add_item_result(
        PipelineStage::Rewriting,
        &ItemResult::processed("a.txt", "Processed file: a.txt"),
    );

    for rx in [&mut rx1, &mut rx2] {
        let events = drain(rx);
        assert!(events.iter().any(|e| matches!(
            e,
            StateChange::ItemProcessed { severity: Severity::Info, message, .. }
                if message == "Processed file: a.txt"
        )));
    }
}

#[tokio::test]
async fn test_concurrent_state_access() {
    let state = Arc::new(StateManager::new());
    state.set_stage(PipelineStage::Rewriting);

    let mut workers = Vec::new();
    for i in 0..8 {
        let state = Arc::clone(&state);
        workers.push(tokio::spawn(async move {
            for j in 0..25 {
                let result = ItemResult::processed(format!("w{}/f{}.txt", i, j), "ok");
                state.item_processed(PipelineStage::Rewriting, &result);
                let _ = state.read(|s| s.processed_items);
            }
        }));
    }

    for worker in workers {
        worker.await.unwrap();
    }

    assert_eq!(state.snapshot().processed_items, 200);
}

#[tokio::test]
async fn test_pipeline_run_event_sequence() {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    fs::write(root.join("a.txt"), "OLDTOKEN").unwrap();

    let state = Arc::new(StateManager::new());
    let mut rx = state.subscribe();

    let observer: Arc<dyn ProgressObserver> = state.clone();
    let pipeline = Pipeline::new(Configuration::new(&root).with_text_substitution("OLDTOKEN", "NEWTOKEN"))
        .with_observer(observer);
    let mut handle = PipelineHandle::spawn(pipeline, &tokio::runtime::Handle::current());

    let status = handle.wait_for(Duration::from_secs(5)).await;
    assert!(matches!(status, JoinStatus::Finished(ref outcome) if outcome.is_success()));

    let events = drain(&mut rx);
    let stages: Vec<PipelineStage> = events
        .iter()
        .filter_map(|e| match e {
            StateChange::StageChanged { stage } => Some(*stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        vec![
            PipelineStage::Expanding,
            PipelineStage::Rewriting,
            PipelineStage::Swapping,
            PipelineStage::Collapsing,
            PipelineStage::Done,
        ]
    );

    assert_eq!(events.first(), Some(&StateChange::RunStarted));
    assert!(matches!(
        events.last(),
        Some(StateChange::RunFinished {
            stage: PipelineStage::Done,
            processed: 1,
            ..
        })
    ));

    let state = state.snapshot();
    assert!(!state.is_running);
    assert_eq!(state.stage, PipelineStage::Done);
    assert_eq!(state.processed_items, 1);
}

#[tokio::test]
async fn test_cancelled_run_is_reflected_in_state() {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    fs::write(root.join("a.txt"), "x").unwrap();

    let state = Arc::new(StateManager::new());
    let observer: Arc<dyn ProgressObserver> = state.clone();
    let pipeline = Pipeline::new(Configuration::new(&root)).with_observer(observer);

    let mut handle = PipelineHandle::spawn_with(&tokio::runtime::Handle::current(), move |stop| {
        // Hold the worker until the stop arrives, then run into it
        while !stop.is_stop_requested() {
            std::thread::sleep(Duration::from_millis(5));
        }
        pipeline.run(stop)
    });

    handle.request_stop();
    let status = handle.wait_for(Duration::from_secs(5)).await;

    assert!(matches!(status, JoinStatus::Cancelled(_)));
    let snapshot = state.snapshot();
    assert_eq!(snapshot.stage, PipelineStage::Cancelled);
    assert_eq!(snapshot.visited_items(), 0);
}

#[tokio::test]
async fn test_reset_emits_state_reset() {
    let state = Arc::new(StateManager::new());
    state.set_stage(PipelineStage::Expanding);
    let mut rx = state.subscribe();

    state.reset();

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(e, StateChange::StateReset)));
    assert_eq!(state.snapshot().stage, PipelineStage::Idle);
}
