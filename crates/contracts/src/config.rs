//! LoaderConfig - Config Loader output
//!
//! Worker pool sizing, plugin request limits and observability settings.

use serde::{Deserialize, Serialize};

use crate::TargetSize;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Full loader configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Worker pool settings
    #[serde(default)]
    pub loader: PoolConfig,

    /// Plugin request settings
    #[serde(default)]
    pub plugins: PluginConfig,

    /// Logging and metrics
    #[serde(default)]
    pub observability: ObservabilitySettings,
}

/// Worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Workers in the shared pool (non-file local images)
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

fn default_worker_threads() -> usize {
    3
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
        }
    }
}

/// Plugin request settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Size limits sent with every cover request
    #[serde(flatten)]
    pub target: TargetSize,
}

/// Logging and metrics settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    /// json / pretty / compact
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus listener port (None = disabled)
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            log_level: default_log_level(),
            metrics_port: None,
        }
    }
}
