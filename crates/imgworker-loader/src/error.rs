//! Error types for image loading
//!
//! None of these reach the rendered output: under the default failure
//! policy a failed load still ends `Loaded` with whatever reference was
//! last set. They are logged and kept on the controller's status.

use imgworker_pool::{ConfigError, PoolError};

/// Image decode / probe failures
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Reference does not point at a live blob
    #[error("cannot resolve image reference: {0}")]
    Unresolvable(String),

    /// Bytes are not a supported image
    #[error("decode failed: {0}")]
    Image(#[from] image::ImageError),

    /// Reading the header failed
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    /// Format could not be guessed from the header
    #[error("unrecognized image format")]
    UnknownFormat,

    /// Blocking decode task panicked or was cancelled
    #[error("decode task failed: {0}")]
    Task(String),
}

/// Main loader error type
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// Neither `src` nor `data-src` is set
    #[error("image props carry no src or data-src")]
    MissingSource,

    /// Worker pool failure
    #[error("worker pool error: {0}")]
    Pool(#[from] PoolError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Image could not be decoded
    #[error("image error: {0}")]
    Decode(#[from] DecodeError),

    /// Worker dropped the fetch
    #[error("fetch failed for {url}")]
    FetchFailed {
        /// Source that was requested
        url: String,
    },
}
