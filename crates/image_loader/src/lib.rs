//! # Image Loader
//!
//! 图片同步协调模块。
//!
//! 负责：
//! - 按图片 id 合并并发请求，同一图片同时只解析一次
//! - 按来源类型选择执行上下文（磁盘单线程 / 共享工作池 / 插件通道）
//! - 在单一分发任务上按登记顺序调用所有回调
//!
//! ## 使用示例
//!
//! ```ignore
//! use image_loader::ImageLoader;
//!
//! let loader = ImageLoader::builder(config, host).build()?;
//! loader.request_synchronization(image.clone(), Box::new(move || {
//!     // 回调中重新检查 image.is_synchronized()
//! }));
//! loader.shutdown().await;
//! ```

pub mod error;
pub mod loader;
pub mod metrics;
pub mod registry;
pub mod sink;

pub use contracts::{ImageProxy, SourceType, SyncCallback};
pub use error::LoaderError;
pub use loader::{ImageLoader, ImageLoaderBuilder};
pub use metrics::{LoaderMetrics, LoaderSnapshot};
pub use registry::{InFlightRegistry, Registration};
pub use sink::DispatchSink;
