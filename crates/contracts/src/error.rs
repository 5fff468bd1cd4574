//! Layered error definitions
//!
//! Categorized by source: config / fetch / plugin

use thiserror::Error;

use crate::PluginId;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Fetch Errors =====
    /// Image bytes could not be turned into usable data
    #[error("decode error for image '{image_id}': {message}")]
    Decode { image_id: String, message: String },

    // ===== Plugin Errors =====
    /// Remote plugin call failed
    #[error("plugin '{plugin}' error: {message}")]
    Plugin { plugin: PluginId, message: String },

    /// No endpoint available for the plugin channel
    #[error("plugin '{plugin}' is not connected")]
    PluginUnavailable { plugin: PluginId },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create decode error
    pub fn decode(image_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            image_id: image_id.into(),
            message: message.into(),
        }
    }

    /// Create plugin call error
    pub fn plugin(plugin: impl Into<PluginId>, message: impl Into<String>) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigParse { .. } => "config_parse",
            Self::ConfigValidation { .. } => "config_validation",
            Self::Decode { .. } => "decode",
            Self::Plugin { .. } => "plugin",
            Self::PluginUnavailable { .. } => "plugin_unavailable",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}
