use std::sync::Arc;
use tokio::sync::watch;

/// Create a connected stop handle / stop signal pair.
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx: Arc::new(tx) }, StopSignal { rx })
}

/// Sending side of the cooperative cancellation token.
///
/// Cloneable so a Ctrl-C handler and a [`PipelineHandle`](super::PipelineHandle) can both hold
/// one.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    /// Ask the running pipeline to stop after its in-flight item. Idempotent.
    pub fn request_stop(&self) {
        if !self.tx.send_replace(true) {
            tracing::info!("Stop requested");
        }
    }

    pub fn is_stop_requested(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Receiving side of the cancellation token, polled by every stage loop.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// A signal that is never raised
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_stop_requested(&self) -> bool {
        *self.rx.borrow()
    }
}
