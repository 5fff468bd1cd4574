//! External plugin boundary
//!
//! The remote endpoint (`CoverReader`) and the hosting environment that
//! connects to it (`PluginHost`). Only the request/response contract matters
//! here; how a plugin decodes its format is its own business.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ContractError, ImageData, PluginId};

/// Maximum target dimensions for a plugin render request.
///
/// `None` means unbounded on that axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSize {
    #[serde(default)]
    pub max_width: Option<u32>,
    #[serde(default)]
    pub max_height: Option<u32>,
}

impl TargetSize {
    /// No limit on either axis
    pub const UNBOUNDED: Self = Self {
        max_width: None,
        max_height: None,
    };

    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width: Some(max_width),
            max_height: Some(max_height),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_width.is_none() && self.max_height.is_none()
    }
}

impl fmt::Display for TargetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let axis = |v: Option<u32>| v.map_or_else(|| "inf".to_string(), |v| v.to_string());
        write!(f, "{}x{}", axis(self.max_width), axis(self.max_height))
    }
}

/// Where a plugin-backed image lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSource {
    /// Which plugin process understands the file
    pub plugin: PluginId,
    /// Path of the book file handed to the plugin
    pub path: PathBuf,
}

/// Remote endpoint of a connected plugin.
///
/// One blocking round trip per call. Implementations are invoked from the
/// channel's dedicated worker only, so they never see concurrent calls.
pub trait CoverReader: Send + Sync {
    /// Render the cover of `path`, fitted into `target`.
    ///
    /// # Errors
    /// Transport failure, timeout, or decode failure inside the plugin.
    fn read_bitmap(&self, path: &str, target: TargetSize) -> Result<ImageData, ContractError>;
}

/// Hosting environment that binds plugin processes.
///
/// `connect` only *requests* a connection; the host later reports the outcome
/// through the channel manager's `on_connected` / `on_disconnected`. Either
/// signal may arrive at any time, including from inside `connect` itself.
pub trait PluginHost: Send + Sync {
    /// Request a connection to the plugin process
    fn connect(&self, plugin: &PluginId);

    /// Tear down the binding to the plugin process
    fn disconnect(&self, plugin: &PluginId);
}
