//! DispatchSink - serialized completion fan-out
//!
//! Workers never run callbacks. They post the finished image id here and a
//! single task drains the registry entry and invokes every callback.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use contracts::SyncCallback;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::metrics::LoaderMetrics;
use crate::registry::InFlightRegistry;

/// Handle to the running dispatch task
pub struct DispatchSink {
    tx: mpsc::UnboundedSender<String>,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl DispatchSink {
    /// Spawn the dispatch task on `runtime`
    pub fn spawn(
        registry: Arc<InFlightRegistry>,
        metrics: Arc<LoaderMetrics>,
        runtime: &Handle,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop, stop_rx) = oneshot::channel();

        let task = runtime.spawn(dispatch_loop(rx, stop_rx, registry, metrics));

        Self { tx, stop, task }
    }

    /// Completion signal for `id`, callable from any thread
    pub fn signal(&self, id: impl Into<String>) -> SyncCallback {
        let tx = self.tx.clone();
        let id = id.into();
        Box::new(move || {
            if let Err(e) = tx.send(id) {
                error!(image_id = %e.0, "Dispatch sink closed, completion lost");
            }
        })
    }

    /// Stop the task after it has delivered every signal already posted
    #[instrument(name = "dispatch_sink_shutdown", skip(self))]
    pub async fn shutdown(self) {
        drop(self.tx);
        let _ = self.stop.send(());
        if let Err(e) = self.task.await {
            error!(error = ?e, "Dispatch task panicked");
        }
        debug!("DispatchSink shutdown complete");
    }
}

#[instrument(name = "dispatch_sink_loop", skip_all)]
async fn dispatch_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut stop: oneshot::Receiver<()>,
    registry: Arc<InFlightRegistry>,
    metrics: Arc<LoaderMetrics>,
) {
    debug!("Dispatch sink started");

    loop {
        tokio::select! {
            biased;
            Some(id) = rx.recv() => deliver(&id, &registry, &metrics),
            _ = &mut stop => break,
        }
    }

    // Flush what was posted before the stop request
    while let Ok(id) = rx.try_recv() {
        deliver(&id, &registry, &metrics);
    }

    debug!("Dispatch sink stopped");
}

fn deliver(id: &str, registry: &InFlightRegistry, metrics: &LoaderMetrics) {
    let Some(callbacks) = registry.drain(id) else {
        metrics.inc_orphaned();
        observability::record_orphan_signal();
        error!(image_id = %id, "Completion for image with no in-flight entry");
        return;
    };

    metrics.inc_completed();
    metrics.add_callbacks(callbacks.len() as u64);
    observability::record_fan_out(callbacks.len());
    observability::record_in_flight(registry.len());

    for callback in callbacks {
        if catch_unwind(AssertUnwindSafe(callback)).is_err() {
            metrics.inc_callback_panics();
            warn!(image_id = %id, "Completion callback panicked");
        }
    }
}
