//! ImageSynchronizer - resolution strategies
//!
//! Local-simple images are fetched inline on the calling worker; plugin
//! images go through the plugin's channel. Failures are logged and swallowed
//! so the completion callback always runs. A resolver that panics counts as
//! a failed resolution.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use contracts::{
    ContractError, CoverReader, ImageProxy, PluginSource, Resolver, SimpleSource, SyncCallback,
    TargetSize,
};
use tracing::{debug, error, warn};

use crate::channel::ChannelManager;

/// Resolution strategy dispatcher
pub struct ImageSynchronizer {
    channels: ChannelManager,
    target: TargetSize,
}

impl ImageSynchronizer {
    /// Create with the channel manager used for plugin images and the
    /// size limits sent with every plugin request
    pub fn new(channels: ChannelManager, target: TargetSize) -> Self {
        Self { channels, target }
    }

    pub fn channels(&self) -> &ChannelManager {
        &self.channels
    }

    pub fn target(&self) -> TargetSize {
        self.target
    }

    /// Resolve `image`, then run `done`.
    ///
    /// Blocks for the duration of a local fetch; run it on a worker.
    ///
    /// # Panics
    /// If the image has no resolver.
    pub fn synchronize(&self, image: Arc<dyn ImageProxy>, done: SyncCallback) {
        if image.is_synchronized() {
            done();
            return;
        }

        let source = match image.resolver() {
            Resolver::Simple(source) => {
                resolve_simple(image.as_ref(), source);
                done();
                return;
            }
            Resolver::Plugin(source) => source.clone(),
            Resolver::Unsupported => unsupported(image.as_ref()),
        };

        self.submit_plugin(image, source, done);
    }

    /// Route a service image straight to its plugin channel (never blocks).
    ///
    /// # Panics
    /// If the image does not resolve through a plugin.
    pub fn synchronize_remote(&self, image: Arc<dyn ImageProxy>, done: SyncCallback) {
        let source = match image.resolver() {
            Resolver::Plugin(source) => source.clone(),
            other => {
                error!(
                    image_id = %image.id(),
                    resolver = other.name(),
                    "Service image without plugin resolver"
                );
                panic!(
                    "service image '{}' cannot resolve through a {} resolver",
                    image.id(),
                    other.name()
                );
            }
        };

        self.submit_plugin(image, source, done);
    }

    fn submit_plugin(&self, image: Arc<dyn ImageProxy>, source: PluginSource, done: SyncCallback) {
        let target = self.target;
        let plugin = source.plugin.clone();

        self.channels.submit(
            &plugin,
            Box::new(move |endpoint| {
                if !image.is_synchronized() {
                    resolve_remote(image.as_ref(), &source, target, endpoint);
                }
                done();
            }),
        );
    }
}

fn unsupported(image: &dyn ImageProxy) -> ! {
    error!(
        image_id = %image.id(),
        source_type = %image.source_type(),
        "No resolver for image"
    );
    panic!(
        "cannot synchronize image '{}' ({} source): no resolver",
        image.id(),
        image.source_type()
    );
}

fn resolve_simple(image: &dyn ImageProxy, source: &dyn SimpleSource) {
    let started = Instant::now();
    let result = guarded(|| source.fetch());
    finish(image, "simple", started, result);
}

fn resolve_remote(
    image: &dyn ImageProxy,
    source: &PluginSource,
    target: TargetSize,
    endpoint: Option<Arc<dyn CoverReader>>,
) {
    let started = Instant::now();
    let result = endpoint
        .ok_or_else(|| ContractError::PluginUnavailable {
            plugin: source.plugin.clone(),
        })
        .and_then(|reader| {
            let path = source.path.to_string_lossy();
            guarded(|| reader.read_bitmap(&path, target))
        });
    finish(image, "plugin", started, result);
}

/// Run a resolver call, turning a panic into an error.
fn guarded<F>(call: F) -> Result<contracts::ImageData, ContractError>
where
    F: FnOnce() -> Result<contracts::ImageData, ContractError>,
{
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        Err(ContractError::Other(format!(
            "resolver panicked: {}",
            panic_message(payload.as_ref())
        )))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}

fn finish(
    image: &dyn ImageProxy,
    resolver: &'static str,
    started: Instant,
    result: Result<contracts::ImageData, ContractError>,
) {
    let source_type = image.source_type();
    match result {
        Ok(data) => {
            let bytes = data.len();
            image.slot().attach(data);
            observability::record_resolution_finished(
                source_type.as_str(),
                resolver,
                started.elapsed(),
            );
            debug!(
                image_id = %image.id(),
                source_type = %source_type,
                resolver,
                bytes,
                "Image synchronized"
            );
        }
        Err(e) => {
            observability::record_resolution_failed(source_type.as_str(), e.kind());
            warn!(
                image_id = %image.id(),
                source_type = %source_type,
                resolver,
                error = %e,
                "Image synchronization failed"
            );
        }
    }
}
