//! Error types for CLI operations.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {}", .path.display())]
    ConfigNotFound { path: PathBuf },

    /// Configuration could not be loaded
    #[error("Failed to load configuration: {0}")]
    Config(#[from] contracts::ContractError),

    /// Loader construction failed
    #[error("Failed to start image loader: {0}")]
    Loader(#[from] image_loader::LoaderError),

    /// Callbacks still outstanding when the wait ended
    #[error("Timed out after {waited:?}: {delivered}/{expected} callbacks delivered")]
    Timeout {
        waited: Duration,
        delivered: usize,
        expected: usize,
    },

    /// Some images were not synchronized
    #[error("{failed} of {total} images failed to synchronize")]
    Unsynchronized { failed: usize, total: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
