//! # Synchronizer
//!
//! 图片同步策略与外部插件通道。
//!
//! 负责：
//! - 本地图片的阻塞式解析（磁盘 / 网络）
//! - 外部插件通道：连接、排队、单线程分发、断开
//! - 固定大小的阻塞工作池
//!
//! ## 使用示例
//!
//! ```ignore
//! use synchronizer::{ChannelManager, ImageSynchronizer, SimpleImage};
//!
//! let channels = ChannelManager::new(host, tokio::runtime::Handle::current());
//! let sync = ImageSynchronizer::new(channels, TargetSize::UNBOUNDED);
//!
//! // On a worker thread
//! sync.synchronize(Arc::new(SimpleImage::file("cover.png")), Box::new(|| {}));
//! ```

mod channel;
mod executor;
mod images;
mod strategy;

pub use channel::{ChannelManager, ChannelState, WorkItem};
pub use executor::{Job, PoolMetrics, PoolSnapshot, WorkerPool};
pub use images::{PluginImage, SimpleImage};
pub use strategy::ImageSynchronizer;

// Re-export contracts types
pub use contracts::{CoverReader, ImageData, ImageProxy, PluginHost, PluginId, TargetSize};
