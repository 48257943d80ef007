//! Prefetcher
//!
//! Owns the worker pool and decoder and hands out controllers that share
//! them.

use crate::config::{LoaderConfig, PrefetchConfig};
use crate::controller::ImageLoadController;
use crate::decode::{Decoder, ImageCrateDecoder};
use crate::error::LoaderError;
use crate::props::ImageProps;
use imgworker_pool::{Fetcher, PoolStats, WorkerPool};
use std::sync::Arc;

/// Factory for image load controllers over one shared pool
#[derive(Clone)]
pub struct Prefetcher {
    pool: Arc<WorkerPool>,
    decoder: Arc<dyn Decoder>,
    config: LoaderConfig,
}

impl Prefetcher {
    /// Stand up an HTTP-backed pool with the full `image` decoder
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// - `LoaderError::Config` if the configuration is invalid
    /// - `LoaderError::Pool` if the pool cannot start
    pub fn from_config(config: PrefetchConfig) -> Result<Self, LoaderError> {
        config.validate()?;
        let pool = WorkerPool::with_http(config.pool)?;
        Ok(Self::new(
            Arc::new(pool),
            Arc::new(ImageCrateDecoder::full()),
            config.loader,
        ))
    }

    /// Stand up a pool around a custom fetcher
    ///
    /// # Errors
    /// - `LoaderError::Pool` if the pool configuration is rejected
    pub fn with_fetcher(
        config: PrefetchConfig,
        fetcher: Arc<dyn Fetcher>,
        decoder: Arc<dyn Decoder>,
    ) -> Result<Self, LoaderError> {
        let pool = WorkerPool::init(config.pool, fetcher)?;
        Ok(Self::new(Arc::new(pool), decoder, config.loader))
    }

    /// Wrap an existing pool
    #[must_use]
    pub fn new(pool: Arc<WorkerPool>, decoder: Arc<dyn Decoder>, config: LoaderConfig) -> Self {
        Self {
            pool,
            decoder,
            config,
        }
    }

    /// Start loading an image
    ///
    /// # Errors
    /// - `LoaderError::MissingSource` if the props carry no source
    pub fn load(&self, props: ImageProps) -> Result<ImageLoadController, LoaderError> {
        ImageLoadController::construct(
            props,
            Arc::clone(&self.pool),
            Arc::clone(&self.decoder),
            self.config,
        )
    }

    /// Shared pool
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Pool statistics
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl std::fmt::Debug for Prefetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prefetcher")
            .field("pool", &self.pool)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
