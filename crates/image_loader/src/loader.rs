//! ImageLoader - request coordination
//!
//! Deduplicates concurrent requests per image id, routes resolutions to the
//! right execution context and posts completions to the dispatch sink.

use std::sync::Arc;

use contracts::{ContractError, ImageProxy, LoaderConfig, PluginHost, SourceType, SyncCallback};
use synchronizer::{ChannelManager, ImageSynchronizer, PoolSnapshot, WorkerPool};
use tokio::runtime::Handle;
use tracing::{debug, error, info, instrument};

use crate::error::LoaderError;
use crate::metrics::{LoaderMetrics, LoaderSnapshot};
use crate::registry::{InFlightRegistry, Registration};
use crate::sink::DispatchSink;

/// Builder for creating an ImageLoader
pub struct ImageLoaderBuilder {
    config: LoaderConfig,
    host: Arc<dyn PluginHost>,
    runtime: Option<Handle>,
}

impl ImageLoaderBuilder {
    /// Create a new builder
    pub fn new(config: LoaderConfig, host: Arc<dyn PluginHost>) -> Self {
        Self {
            config,
            host,
            runtime: None,
        }
    }

    /// Runtime hosting the worker pools and the dispatch sink.
    /// Defaults to the current runtime.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Build and start the loader
    #[instrument(name = "image_loader_build", skip(self))]
    pub fn build(self) -> Result<ImageLoader, LoaderError> {
        let worker_threads = self.config.loader.worker_threads;
        if worker_threads == 0 {
            return Err(ContractError::config_validation(
                "loader.worker_threads",
                "must be at least 1",
            )
            .into());
        }

        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current()?,
        };

        let registry = Arc::new(InFlightRegistry::new());
        let metrics = Arc::new(LoaderMetrics::new());
        let sink = DispatchSink::spawn(Arc::clone(&registry), Arc::clone(&metrics), &runtime);

        let channels = ChannelManager::new(self.host, runtime.clone());
        let synchronizer = Arc::new(ImageSynchronizer::new(
            channels,
            self.config.plugins.target,
        ));

        let file_pool = WorkerPool::spawn("file", 1, &runtime);
        let pool = WorkerPool::spawn("image", worker_threads, &runtime);

        info!(
            worker_threads,
            target = %self.config.plugins.target,
            "ImageLoader started"
        );

        Ok(ImageLoader {
            synchronizer,
            registry,
            file_pool,
            pool,
            sink,
            metrics,
        })
    }
}

/// Coordinates image synchronization requests
///
/// Every request eventually invokes its callback exactly once, on the
/// dispatch sink, or inline when the image is already synchronized.
pub struct ImageLoader {
    synchronizer: Arc<ImageSynchronizer>,
    registry: Arc<InFlightRegistry>,
    /// Single worker for disk reads
    file_pool: WorkerPool,
    /// Shared pool for the other local kinds
    pool: WorkerPool,
    sink: DispatchSink,
    metrics: Arc<LoaderMetrics>,
}

impl ImageLoader {
    pub fn builder(config: LoaderConfig, host: Arc<dyn PluginHost>) -> ImageLoaderBuilder {
        ImageLoaderBuilder::new(config, host)
    }

    /// Make `image` synchronized, then invoke `on_complete`.
    ///
    /// Callable from any thread, never blocks on resolution. Callers must
    /// re-check the image state in the callback: a failed resolution still
    /// completes.
    ///
    /// # Panics
    /// If a service image does not resolve through a plugin.
    pub fn request_synchronization(&self, image: Arc<dyn ImageProxy>, on_complete: SyncCallback) {
        self.request(image, Some(on_complete));
    }

    /// Start resolving `image` without waiting on it
    pub fn prefetch(&self, image: Arc<dyn ImageProxy>) {
        self.request(image, None);
    }

    #[instrument(
        name = "image_loader_request",
        skip_all,
        fields(image_id = %image.id(), source_type = %image.source_type())
    )]
    fn request(&self, image: Arc<dyn ImageProxy>, on_complete: Option<SyncCallback>) {
        let source_type = image.source_type();

        if image.is_synchronized() {
            self.metrics.inc_fast_path();
            observability::record_fast_path(source_type.as_str());
            if let Some(callback) = on_complete {
                callback();
            }
            return;
        }

        if self.registry.register(image.id(), on_complete) == Registration::Joined {
            self.metrics.inc_joined();
            observability::record_request_joined(source_type.as_str());
            debug!("Joined in-flight resolution");
            return;
        }

        self.metrics.inc_started();
        observability::record_resolution_started(source_type.as_str());
        observability::record_in_flight(self.registry.len());

        let done = self.sink.signal(image.id());
        match source_type {
            SourceType::Service => self.synchronizer.synchronize_remote(image, done),
            SourceType::File => self.run_on(&self.file_pool, image, done),
            SourceType::Network => self.run_on(&self.pool, image, done),
        }
    }

    fn run_on(&self, pool: &WorkerPool, image: Arc<dyn ImageProxy>, done: SyncCallback) {
        let synchronizer = Arc::clone(&self.synchronizer);
        let accepted = pool.execute(Box::new(move || synchronizer.synchronize(image, done)));
        if !accepted {
            error!(pool = pool.name(), "Worker pool closed, resolution not scheduled");
        }
    }

    /// Disconnect every plugin channel.
    ///
    /// Running resolutions still complete and fan out.
    #[instrument(name = "image_loader_clear", skip(self))]
    pub fn clear(&self) {
        self.synchronizer.channels().clear();
    }

    /// Plugin channels, for delivering connect/disconnect signals
    pub fn channels(&self) -> &ChannelManager {
        self.synchronizer.channels()
    }

    pub fn synchronizer(&self) -> &ImageSynchronizer {
        &self.synchronizer
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.registry.is_in_flight(id)
    }

    /// Number of resolutions currently running
    pub fn in_flight(&self) -> usize {
        self.registry.len()
    }

    /// Get current metrics
    pub fn metrics(&self) -> LoaderSnapshot {
        self.metrics.snapshot()
    }

    /// Get metrics for the file and shared pools
    pub fn pool_metrics(&self) -> Vec<(String, PoolSnapshot)> {
        [&self.file_pool, &self.pool]
            .into_iter()
            .map(|p| (p.name().to_string(), p.metrics().snapshot()))
            .collect()
    }

    /// Clear channels, finish queued local work, then stop the sink once
    /// it has delivered every completion already posted.
    #[instrument(name = "image_loader_shutdown", skip(self))]
    pub async fn shutdown(self) {
        self.synchronizer.channels().clear();
        self.file_pool.shutdown().await;
        self.pool.shutdown().await;
        self.sink.shutdown().await;

        let snapshot = self.metrics.snapshot();
        info!(
            started = snapshot.started,
            completed = snapshot.completed,
            callbacks = snapshot.callbacks,
            "ImageLoader shutdown complete"
        );
    }
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("in_flight", &self.registry.len())
            .field("channels", &self.synchronizer.channels().len())
            .field("workers", &self.pool.size())
            .finish()
    }
}
