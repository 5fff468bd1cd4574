//! Concrete image handles
//!
//! - `SimpleImage`: local-simple variant with an injected blocking fetch
//! - `PluginImage`: cover rendered by an external plugin

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use contracts::{
    ContractError, ImageData, ImageProxy, ImageSlot, PluginId, PluginSource, Resolver,
    SimpleSource, SourceType,
};

type FetchFn = dyn Fn() -> Result<ImageData, ContractError> + Send + Sync;

/// Image resolved by a single blocking call
pub struct SimpleImage {
    id: String,
    source_type: SourceType,
    slot: ImageSlot,
    fetcher: Box<FetchFn>,
    /// Attached data older than this is outdated
    expiry: Option<Duration>,
}

impl SimpleImage {
    /// Create from an arbitrary fetch closure
    pub fn new<F>(id: impl Into<String>, source_type: SourceType, fetch: F) -> Self
    where
        F: Fn() -> Result<ImageData, ContractError> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            source_type,
            slot: ImageSlot::new(),
            fetcher: Box::new(fetch),
            expiry: None,
        }
    }

    /// Image stored on local disk; the path is its identity
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = path.display().to_string();
        Self::new(id, SourceType::File, move || read_file(&path))
    }

    /// Treat attached data as outdated once it is older than `expiry`
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = Some(expiry);
        self
    }
}

fn read_file(path: &Path) -> Result<ImageData, ContractError> {
    let bytes = std::fs::read(path)?;
    if bytes.is_empty() {
        return Err(ContractError::decode(
            path.display().to_string(),
            "file is empty",
        ));
    }
    Ok(ImageData::encoded(bytes))
}

impl SimpleSource for SimpleImage {
    fn fetch(&self) -> Result<ImageData, ContractError> {
        (self.fetcher)()
    }
}

impl ImageProxy for SimpleImage {
    fn id(&self) -> &str {
        &self.id
    }

    fn source_type(&self) -> SourceType {
        self.source_type
    }

    fn slot(&self) -> &ImageSlot {
        &self.slot
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::Simple(self)
    }

    fn is_outdated(&self) -> bool {
        match (self.expiry, self.slot.attached_at()) {
            (Some(expiry), Some(at)) => at.elapsed() >= expiry,
            _ => false,
        }
    }
}

impl fmt::Debug for SimpleImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleImage")
            .field("id", &self.id)
            .field("source_type", &self.source_type)
            .field("synchronized", &self.slot.is_set())
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Cover of a book only an external plugin can read
#[derive(Debug)]
pub struct PluginImage {
    id: String,
    source: PluginSource,
    slot: ImageSlot,
}

impl PluginImage {
    pub fn new(plugin: impl Into<PluginId>, path: impl Into<PathBuf>) -> Self {
        let source = PluginSource {
            plugin: plugin.into(),
            path: path.into(),
        };
        Self {
            id: format!("{}:{}", source.plugin, source.path.display()),
            source,
            slot: ImageSlot::new(),
        }
    }

    pub fn plugin(&self) -> &PluginId {
        &self.source.plugin
    }

    pub fn path(&self) -> &Path {
        &self.source.path
    }
}

impl ImageProxy for PluginImage {
    fn id(&self) -> &str {
        &self.id
    }

    fn source_type(&self) -> SourceType {
        SourceType::Service
    }

    fn slot(&self) -> &ImageSlot {
        &self.slot
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::Plugin(&self.source)
    }
}
