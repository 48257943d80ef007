//! Worker pool for prefetching images
//!
//! Owns a fixed set of worker units, each a Tokio task draining its own
//! request queue one fetch at a time:
//! - Unit acquisition (first free in index order, with a saturation policy)
//! - Request dispatch with per-request reply channels
//! - Pool statistics

use crate::blob::{BlobStore, BlobUrl};
use crate::config::{PoolConfig, SaturationPolicy};
use crate::error::{FetchError, PoolError};
use crate::fetch::{Fetcher, HttpFetcher};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio_util::sync::CancellationToken;
use ulid::Ulid;

/// Identifier attached to every dispatched request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub Ulid);

impl RequestId {
    /// Generate new request ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single fetch travelling to a worker unit
#[derive(Debug)]
pub struct LoadRequest {
    /// Request ID
    pub id: RequestId,
    /// Image URL to fetch
    pub url: String,
    /// Completion channel; dropped without a value on failure
    reply: oneshot::Sender<BlobUrl>,
    /// Abandons the request when cancelled
    cancel: CancellationToken,
}

/// One background execution unit
#[derive(Debug)]
struct WorkerUnit {
    index: usize,
    sender: mpsc::Sender<LoadRequest>,
    busy: AtomicBool,
}

/// Unit handed out by [`WorkerPool::acquire`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerHandle {
    index: usize,
    exclusive: bool,
}

impl WorkerHandle {
    /// Index of the unit
    #[inline]
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether this handle marked the unit busy
    ///
    /// `false` only for the saturation fallback, where the unit is shared
    /// with whoever already holds it and must not be released by this caller.
    #[inline]
    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }
}

/// Pending result of a dispatched request
#[derive(Debug)]
pub struct Dispatch {
    id: RequestId,
    reply: oneshot::Receiver<BlobUrl>,
}

impl Dispatch {
    /// Request ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Wait for the blob URL
    ///
    /// Resolves to `None` when the fetch failed or was cancelled; the
    /// worker has already logged why.
    pub async fn wait(self) -> Option<BlobUrl> {
        self.reply.await.ok()
    }
}

/// Pool statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of units
    pub size: usize,
    /// Units currently marked busy
    pub busy: usize,
    /// Requests handed to a unit
    pub dispatched: u64,
    /// Requests answered with a blob URL
    pub completed: u64,
    /// Requests dropped after a fetch failure
    pub failed: u64,
    /// Requests abandoned through cancellation
    pub cancelled: u64,
    /// Acquisitions that found every unit busy
    pub saturated: u64,
}

#[derive(Debug, Default)]
struct Counters {
    dispatched: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    saturated: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Fixed-size pool of image fetching units
#[derive(Debug)]
pub struct WorkerPool {
    /// Configuration
    config: PoolConfig,
    /// Units in index order
    units: Vec<WorkerUnit>,
    /// Fetched bodies
    blobs: Arc<BlobStore>,
    /// Signalled on every busy -> free transition
    freed: Notify,
    /// Statistics
    counters: Arc<Counters>,
}

impl WorkerPool {
    /// Create the pool and spawn one task per unit
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// - `PoolError::Config` if the configuration is invalid
    pub fn init(config: PoolConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self, PoolError> {
        config.validate()?;

        let blobs = Arc::new(BlobStore::new());
        let counters = Arc::new(Counters::default());

        let units = (0..config.size)
            .map(|index| {
                let (tx, rx) = mpsc::channel(config.queue_capacity);
                tokio::spawn(worker_task(
                    index,
                    Arc::clone(&fetcher),
                    Arc::clone(&blobs),
                    Arc::clone(&counters),
                    rx,
                ));
                WorkerUnit {
                    index,
                    sender: tx,
                    busy: AtomicBool::new(false),
                }
            })
            .collect::<Vec<_>>();

        tracing::info!(
            units = units.len(),
            saturation = ?config.saturation,
            "worker pool initialized"
        );

        Ok(Self {
            config,
            units,
            blobs,
            freed: Notify::new(),
            counters,
        })
    }

    /// Create the pool with the HTTP fetcher
    ///
    /// # Errors
    /// - `PoolError::Config` if the configuration is invalid
    /// - `PoolError::Fetcher` if the HTTP client cannot be built
    pub fn with_http(config: PoolConfig) -> Result<Self, PoolError> {
        let fetcher = HttpFetcher::new(&config)?;
        Self::init(config, Arc::new(fetcher))
    }

    /// Acquire a unit, falling back to unit 0 when all are busy
    ///
    /// The fallback leaves every busy flag untouched and returns a
    /// non-exclusive handle; no error is raised.
    pub fn acquire(&self) -> WorkerHandle {
        if let Some(handle) = self.try_acquire() {
            return handle;
        }

        Counters::bump(&self.counters.saturated);
        tracing::warn!(units = self.units.len(), "all worker units busy, sharing unit 0");

        WorkerHandle {
            index: 0,
            exclusive: false,
        }
    }

    /// Acquire the first free unit in index order, if any
    pub fn try_acquire(&self) -> Option<WorkerHandle> {
        let unit = self.units.iter().find(|unit| {
            unit.busy
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        })?;

        tracing::debug!(unit = unit.index, "acquired worker unit");
        Some(WorkerHandle {
            index: unit.index,
            exclusive: true,
        })
    }

    /// Acquire a unit, waiting for a release when all are busy
    pub async fn acquire_queued(&self) -> WorkerHandle {
        let mut waited = false;
        loop {
            let notified = self.freed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(handle) = self.try_acquire() {
                return handle;
            }

            if !waited {
                waited = true;
                Counters::bump(&self.counters.saturated);
                tracing::debug!(units = self.units.len(), "all worker units busy, queueing");
            }
            notified.await;
        }
    }

    /// Acquire according to the configured [`SaturationPolicy`]
    pub async fn acquire_with_policy(&self) -> WorkerHandle {
        match self.config.saturation {
            SaturationPolicy::Fallback => self.acquire(),
            SaturationPolicy::Queue => self.acquire_queued().await,
        }
    }

    /// Mark unit `index` free
    ///
    /// Unknown indices and already free units are ignored.
    pub fn release(&self, index: usize) {
        let Some(unit) = self.units.get(index) else {
            tracing::debug!(unit = index, "release of unknown worker unit ignored");
            return;
        };

        if unit.busy.swap(false, Ordering::AcqRel) {
            tracing::debug!(unit = index, "released worker unit");
            self.freed.notify_one();
        }
    }

    /// Send `url` to a unit for fetching
    ///
    /// # Errors
    /// - `PoolError::NoUnit` if the handle is not from this pool
    /// - `PoolError::CommunicationFailed` if the unit task has stopped
    pub async fn dispatch(&self, unit: &WorkerHandle, url: &str) -> Result<Dispatch, PoolError> {
        self.dispatch_cancellable(unit, url, CancellationToken::new())
            .await
    }

    /// Send `url` to a unit; the unit abandons it once `cancel` fires
    ///
    /// # Errors
    /// - `PoolError::NoUnit` if the handle is not from this pool
    /// - `PoolError::CommunicationFailed` if the unit task has stopped
    pub async fn dispatch_cancellable(
        &self,
        unit: &WorkerHandle,
        url: &str,
        cancel: CancellationToken,
    ) -> Result<Dispatch, PoolError> {
        let worker = self
            .units
            .get(unit.index)
            .ok_or(PoolError::NoUnit(unit.index))?;

        let id = RequestId::new();
        let (tx, rx) = oneshot::channel();
        let request = LoadRequest {
            id,
            url: url.to_string(),
            reply: tx,
            cancel,
        };

        worker.sender.send(request).await.map_err(|_| {
            PoolError::CommunicationFailed(format!("worker unit {} is closed", unit.index))
        })?;

        Counters::bump(&self.counters.dispatched);
        tracing::debug!(request = %id, unit = unit.index, url, "dispatched fetch");

        Ok(Dispatch { id, reply: rx })
    }

    /// Blob store holding fetched bodies
    #[inline]
    #[must_use]
    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Pool configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Number of units
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.units.len()
    }

    /// Check if unit `index` is marked busy
    #[must_use]
    pub fn is_busy(&self, index: usize) -> bool {
        self.units
            .get(index)
            .is_some_and(|unit| unit.busy.load(Ordering::Acquire))
    }

    /// Busy flag of every unit in index order
    #[must_use]
    pub fn busy_flags(&self) -> Vec<bool> {
        self.units
            .iter()
            .map(|unit| unit.busy.load(Ordering::Acquire))
            .collect()
    }

    /// Get pool statistics
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        PoolStats {
            size: self.units.len(),
            busy: self.busy_flags().into_iter().filter(|busy| *busy).count(),
            dispatched: load(&self.counters.dispatched),
            completed: load(&self.counters.completed),
            failed: load(&self.counters.failed),
            cancelled: load(&self.counters.cancelled),
            saturated: load(&self.counters.saturated),
        }
    }
}

/// Unit task (runs in a separate tokio task until the pool is dropped)
async fn worker_task(
    index: usize,
    fetcher: Arc<dyn Fetcher>,
    blobs: Arc<BlobStore>,
    counters: Arc<Counters>,
    mut rx: mpsc::Receiver<LoadRequest>,
) {
    while let Some(request) = rx.recv().await {
        let LoadRequest {
            id,
            url,
            reply,
            cancel,
        } = request;

        if cancel.is_cancelled() {
            Counters::bump(&counters.cancelled);
            tracing::debug!(request = %id, unit = index, "skipping cancelled request");
            continue;
        }

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(FetchError::Cancelled),
            result = fetcher.fetch(&url) => result,
        };

        match result {
            Ok(bytes) if cancel.is_cancelled() || reply.is_closed() => {
                Counters::bump(&counters.cancelled);
                tracing::debug!(request = %id, unit = index, bytes = bytes.len(), "discarding unwanted result");
            }
            Ok(bytes) => {
                let blob = blobs.create(bytes);
                match reply.send(blob) {
                    Ok(()) => Counters::bump(&counters.completed),
                    Err(blob) => {
                        blobs.revoke(blob.as_str());
                        Counters::bump(&counters.cancelled);
                    }
                }
            }
            Err(FetchError::Cancelled) => {
                Counters::bump(&counters.cancelled);
                tracing::debug!(request = %id, unit = index, "fetch cancelled");
            }
            Err(e) => {
                Counters::bump(&counters.failed);
                tracing::error!(request = %id, unit = index, url = %url, error = %e, "image fetch failed");
            }
        }
    }

    tracing::debug!(unit = index, "worker unit stopped");
}
