//! Loader metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a single loader
#[derive(Debug, Default)]
pub struct LoaderMetrics {
    /// Requests answered without any hand-off
    fast_path: AtomicU64,
    /// Resolutions actually launched
    started: AtomicU64,
    /// Requests merged into an in-flight resolution
    joined: AtomicU64,
    /// Completion signals drained by the dispatch sink
    completed: AtomicU64,
    /// Callbacks invoked by the dispatch sink
    callbacks: AtomicU64,
    /// Callbacks that panicked
    callback_panics: AtomicU64,
    /// Completion signals with no registry entry
    orphaned: AtomicU64,
}

impl LoaderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fast_path(&self) -> u64 {
        self.fast_path.load(Ordering::Relaxed)
    }

    pub fn inc_fast_path(&self) {
        self.fast_path.fetch_add(1, Ordering::Relaxed);
    }

    /// Get number of resolutions launched
    pub fn started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    pub fn inc_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn joined(&self) -> u64 {
        self.joined.load(Ordering::Relaxed)
    }

    pub fn inc_joined(&self) {
        self.joined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn inc_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn callbacks(&self) -> u64 {
        self.callbacks.load(Ordering::Relaxed)
    }

    pub fn add_callbacks(&self, count: u64) {
        self.callbacks.fetch_add(count, Ordering::Relaxed);
    }

    pub fn callback_panics(&self) -> u64 {
        self.callback_panics.load(Ordering::Relaxed)
    }

    pub fn inc_callback_panics(&self) {
        self.callback_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn orphaned(&self) -> u64 {
        self.orphaned.load(Ordering::Relaxed)
    }

    pub fn inc_orphaned(&self) {
        self.orphaned.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> LoaderSnapshot {
        LoaderSnapshot {
            fast_path: self.fast_path(),
            started: self.started(),
            joined: self.joined(),
            completed: self.completed(),
            callbacks: self.callbacks(),
            callback_panics: self.callback_panics(),
            orphaned: self.orphaned(),
        }
    }
}

/// Snapshot of loader metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderSnapshot {
    pub fast_path: u64,
    pub started: u64,
    pub joined: u64,
    pub completed: u64,
    pub callbacks: u64,
    pub callback_panics: u64,
    pub orphaned: u64,
}
