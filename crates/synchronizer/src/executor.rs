//! WorkerPool - fixed set of workers draining one job queue
//!
//! Each job is a blocking closure; workers hand it to the blocking thread
//! pool and wait for it, so a pool of N workers never runs more than N jobs
//! at once and a pool of one runs its jobs strictly in submission order.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_channel::{unbounded, Receiver, Sender};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument};

/// Unit of blocking work
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a running pool
pub struct WorkerPool {
    /// Pool name (used for logging)
    name: String,
    /// Job queue shared by all workers
    tx: Sender<Job>,
    /// Shared metrics
    metrics: Arc<PoolMetrics>,
    /// Worker task handles
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers on `runtime` (at least one)
    pub fn spawn(name: impl Into<String>, size: usize, runtime: &Handle) -> Self {
        let name = name.into();
        let (tx, rx) = unbounded();
        let metrics = Arc::new(PoolMetrics::new());

        let workers = (0..size.max(1))
            .map(|index| {
                let worker_rx = rx.clone();
                let worker_metrics = Arc::clone(&metrics);
                let worker_name = name.clone();
                runtime.spawn(async move {
                    pool_worker(worker_name, index, worker_rx, worker_metrics).await;
                })
            })
            .collect();

        Self {
            name,
            tx,
            metrics,
            workers,
        }
    }

    /// Get pool name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of workers
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<PoolMetrics> {
        &self.metrics
    }

    /// Queue a job (non-blocking, callable from any thread)
    ///
    /// Returns false if the pool has been shut down; the job is dropped.
    pub fn execute(&self, job: Job) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => {
                self.metrics.inc_submitted();
                self.metrics.set_queue_len(self.tx.len());
                true
            }
            Err(_) => {
                error!(pool = %self.name, "Pool closed, job dropped");
                false
            }
        }
    }

    /// Stop accepting jobs, let queued jobs finish, wait for the workers
    #[instrument(name = "worker_pool_shutdown", skip(self), fields(pool = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!(pool = %self.name, error = ?e, "Worker task panicked");
            }
        }
        debug!(pool = %self.name, "WorkerPool shutdown complete");
    }
}

/// Worker loop: pull jobs until the queue is closed and empty
async fn pool_worker(name: String, index: usize, rx: Receiver<Job>, metrics: Arc<PoolMetrics>) {
    debug!(pool = %name, worker = index, "Pool worker started");

    while let Ok(job) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match tokio::task::spawn_blocking(job).await {
            Ok(()) => metrics.inc_completed(),
            Err(e) => {
                metrics.inc_panicked();
                error!(pool = %name, worker = index, error = %e, "Job panicked");
            }
        }
    }

    debug!(pool = %name, worker = index, "Pool worker stopped");
}

/// Metrics for a single pool
#[derive(Debug, Default)]
pub struct PoolMetrics {
    /// Approximate queue length
    queue_len: AtomicUsize,
    /// Jobs accepted
    submitted: AtomicU64,
    /// Jobs finished normally
    completed: AtomicU64,
    /// Jobs that panicked
    panicked: AtomicU64,
}

impl PoolMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn inc_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn inc_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }

    pub fn inc_panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            queue_len: self.queue_len(),
            submitted: self.submitted(),
            completed: self.completed(),
            panicked: self.panicked(),
        }
    }
}

/// Snapshot of pool metrics (for reporting)
#[derive(Debug, Clone, Copy)]
pub struct PoolSnapshot {
    pub queue_len: usize,
    pub submitted: u64,
    pub completed: u64,
    pub panicked: u64,
}
