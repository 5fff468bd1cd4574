//! Image handle contracts
//!
//! An image handle is an identity plus a staleness policy plus the slot its
//! resolved data gets attached to. "In progress" is never tracked here; only
//! the loader's in-flight registry knows that.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Instant;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{ContractError, PluginSource};

/// Completion callback handed to the loader.
///
/// Runs exactly once, on the dispatch sink (or inline on the fast path).
pub type SyncCallback = Box<dyn FnOnce() + Send + 'static>;

/// Where an image's bytes come from; drives worker routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Local disk
    File,
    /// Remote download
    Network,
    /// Out-of-process plugin
    Service,
}

impl SourceType {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Network => "network",
            Self::Service => "service",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable synchronization state of a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Unsynchronized,
    Synchronized,
}

/// Resolved image data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    /// Width in pixels (0 when still encoded)
    pub width: u32,

    /// Height in pixels (0 when still encoded)
    pub height: u32,

    /// Pixel layout
    pub format: ImageFormat,

    /// Raw bytes (zero-copy)
    pub data: Bytes,
}

impl ImageData {
    /// Wrap bytes of an image that has not been decoded yet
    pub fn encoded(data: impl Into<Bytes>) -> Self {
        Self {
            width: 0,
            height: 0,
            format: ImageFormat::Encoded,
            data: data.into(),
        }
    }

    /// Wrap a decoded RGBA8 pixel buffer
    pub fn rgba8(width: u32, height: u32, data: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            format: ImageFormat::Rgba8,
            data: data.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Rgba8,
    /// Container bytes (PNG/JPEG/...) left for the display layer to decode
    Encoded,
}

struct Attached {
    image: ImageData,
    at: Instant,
    generation: u64,
}

/// Synchronized flag plus the data it vouches for.
///
/// `attach` stores data before publishing the flag, so anyone who observes
/// the flag set also finds data. Every attach bumps a generation; the flag is
/// only cleared for the generation that was found stale.
#[derive(Default)]
pub struct ImageSlot {
    synchronized: AtomicBool,
    attached: RwLock<Option<Attached>>,
}

impl ImageSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach resolved data and mark the slot synchronized
    pub fn attach(&self, image: ImageData) {
        let mut guard = self
            .attached
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let generation = guard.as_ref().map_or(0, |a| a.generation) + 1;
        *guard = Some(Attached {
            image,
            at: Instant::now(),
            generation,
        });
        self.synchronized.store(true, Ordering::Release);
    }

    /// Raw flag, without any staleness check
    pub fn is_set(&self) -> bool {
        self.synchronized.load(Ordering::Acquire)
    }

    /// Number of attaches so far
    pub fn generation(&self) -> u64 {
        self.attached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, |a| a.generation)
    }

    /// Clear the flag if no attach happened since `generation` was read.
    ///
    /// Returns whether the flag was cleared. The last attached data stays
    /// readable either way.
    pub fn invalidate(&self, generation: u64) -> bool {
        let guard = self
            .attached
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let current = guard.as_ref().map_or(0, |a| a.generation);
        current == generation
            && self
                .synchronized
                .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    /// Last attached data (may be stale)
    pub fn image(&self) -> Option<ImageData> {
        self.attached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|a| a.image.clone())
    }

    /// When data was last attached
    pub fn attached_at(&self) -> Option<Instant> {
        self.attached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|a| a.at)
    }
}

impl fmt::Debug for ImageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageSlot")
            .field("synchronized", &self.is_set())
            .field("attached_at", &self.attached_at())
            .finish()
    }
}

/// Blocking local fetch (disk read, HTTP download, ...)
pub trait SimpleSource: Send + Sync {
    /// Produce the image data. Called from a worker thread; may block.
    fn fetch(&self) -> Result<ImageData, ContractError>;
}

/// How a handle gets resolved
pub enum Resolver<'a> {
    /// Single blocking call on the worker that runs it
    Simple(&'a dyn SimpleSource),
    /// Round trip through the plugin's channel
    Plugin(&'a PluginSource),
    /// No resolution path; requesting one is a programming error
    Unsupported,
}

impl Resolver<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Simple(_) => "simple",
            Self::Plugin(_) => "plugin",
            Self::Unsupported => "unsupported",
        }
    }
}

/// Image handle
///
/// Implementors supply identity, routing, and the slot; the synchronized
/// query and its lazy staleness check are provided.
pub trait ImageProxy: Send + Sync {
    /// Stable identity, unique per logical image resource
    fn id(&self) -> &str;

    /// Routing kind
    fn source_type(&self) -> SourceType;

    /// Storage for the synchronized flag and attached data
    fn slot(&self) -> &ImageSlot;

    /// Resolution capability
    fn resolver(&self) -> Resolver<'_>;

    /// Staleness predicate, evaluated on every synchronized query
    fn is_outdated(&self) -> bool {
        false
    }

    /// Whether fresh data is attached.
    ///
    /// A set flag on an outdated handle is cleared before answering.
    fn is_synchronized(&self) -> bool {
        let slot = self.slot();
        let generation = slot.generation();
        if slot.is_set() && self.is_outdated() {
            slot.invalidate(generation);
        }
        slot.is_set()
    }

    fn state(&self) -> SyncState {
        if self.is_synchronized() {
            SyncState::Synchronized
        } else {
            SyncState::Unsynchronized
        }
    }

    /// Last attached data, fresh or not
    fn real_image(&self) -> Option<ImageData> {
        self.slot().image()
    }
}
