use super::{Pipeline, PipelineOutcome, StopHandle, StopSignal, stop_channel};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Result of a bounded wait on a [`PipelineHandle`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinStatus {
    /// The worker ran to completion (successfully or not)
    Finished(PipelineOutcome),

    /// The worker observed the stop signal and returned early
    Cancelled(PipelineOutcome),

    /// The worker did not return within the wait; it must be treated as still running
    StillRunning,
}

impl From<PipelineOutcome> for JoinStatus {
    fn from(outcome: PipelineOutcome) -> Self {
        if outcome.is_cancelled() {
            JoinStatus::Cancelled(outcome)
        } else {
            JoinStatus::Finished(outcome)
        }
    }
}

enum Worker {
    Running(JoinHandle<PipelineOutcome>),
    Joined(PipelineOutcome),
}

/// A pipeline running on a tokio blocking worker.
///
/// The worker owns the pipeline; the handle owns the stop switch and the join.
pub struct PipelineHandle {
    stop: StopHandle,
    worker: Worker,
}

impl PipelineHandle {
    /// Run `pipeline` on the blocking pool of `runtime`.
    pub fn spawn(pipeline: Pipeline, runtime: &Handle) -> Self {
        Self::spawn_with(runtime, move |stop| pipeline.run(stop))
    }

    /// Run an arbitrary pipeline body on the blocking pool, handing it the stop signal.
    pub fn spawn_with<F>(runtime: &Handle, body: F) -> Self
    where
        F: FnOnce(&StopSignal) -> PipelineOutcome + Send + 'static,
    {
        let (stop, signal) = stop_channel();
        let task = runtime.spawn_blocking(move || body(&signal));

        tracing::debug!("Pipeline worker spawned");
        Self {
            stop,
            worker: Worker::Running(task),
        }
    }

    /// Ask the worker to stop after its in-flight item
    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    /// A cloneable stop switch for this worker (for signal handlers)
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn is_finished(&self) -> bool {
        match &self.worker {
            Worker::Running(task) => task.is_finished(),
            Worker::Joined(_) => true,
        }
    }

    /// Wait for the worker without a time limit
    pub async fn wait(&mut self) -> PipelineOutcome {
        loop {
            match self.wait_for(Duration::from_secs(3600)).await {
                JoinStatus::Finished(outcome) | JoinStatus::Cancelled(outcome) => return outcome,
                JoinStatus::StillRunning => continue,
            }
        }
    }

    /// Wait at most `limit` for the worker to return.
    ///
    /// Once the worker has been joined its outcome is cached, so calling this again returns
    /// the same status immediately.
    pub async fn wait_for(&mut self, limit: Duration) -> JoinStatus {
        let task = match &mut self.worker {
            Worker::Joined(outcome) => return JoinStatus::from(outcome.clone()),
            Worker::Running(task) => task,
        };

        let outcome = match tokio::time::timeout(limit, task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tracing::error!("Pipeline worker did not complete: {}", e);
                PipelineOutcome::Failed {
                    reason: "Pipeline worker panicked".to_string(),
                }
            }
            Err(_) => {
                tracing::warn!("Pipeline still running after {:?}", limit);
                return JoinStatus::StillRunning;
            }
        };

        self.worker = Worker::Joined(outcome.clone());
        JoinStatus::from(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Configuration, PipelineStage};
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_finished_pipeline_is_joined() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();

        let mut handle = PipelineHandle::spawn(
            Pipeline::new(Configuration::new(&root)),
            &Handle::current(),
        );

        let status = handle.wait_for(Duration::from_secs(5)).await;
        match status {
            JoinStatus::Finished(outcome) => assert!(outcome.is_success()),
            other => panic!("unexpected status: {:?}", other),
        }

        assert!(handle.is_finished());
        assert!(matches!(
            handle.wait_for(Duration::from_millis(1)).await,
            JoinStatus::Finished(_)
        ));
    }

    #[tokio::test]
    async fn test_still_running_until_stop_is_observed() {
        let mut handle = PipelineHandle::spawn_with(&Handle::current(), |stop| {
            while !stop.is_stop_requested() {
                std::thread::sleep(Duration::from_millis(5));
            }
            PipelineOutcome::Cancelled {
                stage: PipelineStage::Rewriting,
                pending: Vec::new(),
            }
        });

        assert_eq!(
            handle.wait_for(Duration::from_millis(20)).await,
            JoinStatus::StillRunning
        );

        handle.stop_handle().request_stop();
        let status = handle.wait_for(Duration::from_secs(5)).await;
        assert!(matches!(status, JoinStatus::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_panicking_worker_is_reported_as_failure() {
        let mut handle = PipelineHandle::spawn_with(&Handle::current(), |_| {
            panic!("worker exploded");
        });

        let outcome = handle.wait().await;
        assert_eq!(
            outcome,
            PipelineOutcome::Failed {
                reason: "Pipeline worker panicked".to_string()
            }
        );
    }
}
