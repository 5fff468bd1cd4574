//! Loader error types

use thiserror::Error;

/// Errors raised while building an `ImageLoader`
///
/// Requests themselves never fail; only construction does.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// No tokio runtime supplied and none current
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// Invalid loader configuration
    #[error("invalid loader configuration: {0}")]
    Contract(#[from] contracts::ContractError),
}
