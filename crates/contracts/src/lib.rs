//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Handle model
//! - An image handle owns its identity, its staleness policy and an [`ImageSlot`]
//! - Staleness is re-evaluated on every synchronized query, never cached
//! - Resolution capability is exposed as a [`Resolver`] variant

mod config;
mod error;
mod image;
mod plugin;
mod plugin_id;

pub use config::*;
pub use error::*;
pub use image::*;
pub use plugin::*;
pub use plugin_id::PluginId;
