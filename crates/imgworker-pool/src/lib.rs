//! imgworker pool - background image prefetching
//!
//! A fixed set of worker units fetches image bodies off the caller's task:
//! - Acquires the first free unit, or applies a saturation policy
//! - Fetches through a pluggable [`Fetcher`] (HTTP by default)
//! - Parks bodies in a [`BlobStore`] and answers with local blob URLs
//! - Logs and drops failed fetches; callers simply receive nothing
//!
//! # Example
//!
//! ```rust,ignore
//! use imgworker_pool::{PoolConfig, WorkerPool};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = WorkerPool::with_http(PoolConfig::new().with_size(2))?;
//!
//! let unit = pool.acquire();
//! let pending = pool.dispatch(&unit, "https://example.com/cat.png").await?;
//! if let Some(blob) = pending.wait().await {
//!     println!("cached as {blob}");
//! }
//! pool.release(unit.index());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod blob;
pub mod config;
pub mod error;
pub mod fetch;
pub mod pool;

// Re-exports for convenience
pub use blob::{BlobStore, BlobUrl, BLOB_SCHEME};
pub use config::{PoolConfig, SaturationPolicy};
pub use error::{ConfigError, FetchError, PoolError};
pub use fetch::{Fetcher, HttpFetcher};
pub use pool::{Dispatch, LoadRequest, PoolStats, RequestId, WorkerHandle, WorkerPool};

// Request cancellation handle, shared with the loader.
pub use tokio_util::sync::CancellationToken;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the pool
    pub use crate::{
        BlobUrl, Fetcher, PoolConfig, SaturationPolicy, WorkerHandle, WorkerPool,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
