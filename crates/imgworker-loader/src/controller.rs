//! Image load controller
//!
//! Drives one image from "requested" to "displayed":
//! - Dispatches the source to the worker pool
//! - Decodes (or header-probes) the fetched blob
//! - Flips `Loading` to a terminal state exactly once
//! - Renders the placeholder or the image
//!
//! Each request runs in its own task under a cancellation token. With
//! `cancel_stale` a source change cancels the previous request, and any
//! result carrying an outdated generation is discarded.

use crate::config::{FailurePolicy, LoaderConfig};
use crate::decode::{Decoder, ImageInfo};
use crate::error::{DecodeError, LoaderError};
use crate::props::ImageProps;
use crate::render::{self, Rendered};
use imgworker_pool::{BlobUrl, CancellationToken, WorkerHandle, WorkerPool};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

/// Controller lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// Waiting for the first result
    Loading,
    /// An image reference is displayed (possibly a broken one)
    Loaded,
    /// Load failed under [`FailurePolicy::Surface`]
    Failed,
}

impl LoadState {
    /// Check if no further transition can happen
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoadState::Loading)
    }
}

/// The image handle's current source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayedImage {
    /// Source the consumer asked for
    pub source: String,
    /// Reference actually displayed: a blob URL, or the raw source after a failed fetch
    pub url: String,
    /// Decoded details; `None` when decoding failed
    pub info: Option<ImageInfo>,
}

/// Observable controller status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageStatus {
    /// Lifecycle state
    pub state: LoadState,
    /// What the image handle shows
    pub displayed: Option<DisplayedImage>,
    /// Most recent failure, if any
    pub error: Option<String>,
}

impl ImageStatus {
    fn loading() -> Self {
        Self {
            state: LoadState::Loading,
            displayed: None,
            error: None,
        }
    }

    /// Source of the displayed image
    #[must_use]
    pub fn displayed_source(&self) -> Option<&str> {
        self.displayed.as_ref().map(|image| image.source.as_str())
    }
}

#[derive(Debug)]
struct Inner {
    props: ImageProps,
    source: String,
    generation: u64,
    current: CancellationToken,
    state: LoadState,
    image: Option<DisplayedImage>,
    last_error: Option<String>,
}

impl Inner {
    fn snapshot(&self) -> ImageStatus {
        ImageStatus {
            state: self.state,
            displayed: self.image.clone(),
            error: self.last_error.clone(),
        }
    }
}

struct Shared {
    pool: Arc<WorkerPool>,
    decoder: Arc<dyn Decoder>,
    config: LoaderConfig,
    /// Parent of every request token; cancelled on drop
    teardown: CancellationToken,
    inner: Mutex<Inner>,
    status: watch::Sender<ImageStatus>,
}

/// Manages one image's lifecycle
pub struct ImageLoadController {
    shared: Arc<Shared>,
}

impl ImageLoadController {
    /// Start loading `props`' source
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// - `LoaderError::MissingSource` if neither `src` nor `data-src` is set
    pub fn construct(
        props: ImageProps,
        pool: Arc<WorkerPool>,
        decoder: Arc<dyn Decoder>,
        config: LoaderConfig,
    ) -> Result<Self, LoaderError> {
        let source = props.source().ok_or(LoaderError::MissingSource)?.to_string();

        let teardown = CancellationToken::new();
        let current = teardown.child_token();
        let (status, _) = watch::channel(ImageStatus::loading());

        let shared = Arc::new(Shared {
            pool,
            decoder,
            config,
            teardown,
            inner: Mutex::new(Inner {
                props,
                source: source.clone(),
                generation: 0,
                current: current.clone(),
                state: LoadState::Loading,
                image: None,
                last_error: None,
            }),
            status,
        });

        tracing::debug!(source = %source, "image load started");
        tokio::spawn(run_request(Arc::clone(&shared), 0, source, current));

        Ok(Self { shared })
    }

    /// Apply new props, re-dispatching if the source changed
    ///
    /// Returns whether a new request was dispatched. Without `cancel_stale`
    /// the previous request keeps running and may still be applied after
    /// this one. A `Failed` controller only takes the new props: its state is
    /// final, so nothing is fetched and `false` is returned.
    ///
    /// # Errors
    /// - `LoaderError::MissingSource` if the new props carry no source
    pub fn on_source_changed(&self, props: ImageProps) -> Result<bool, LoaderError> {
        let source = props.source().ok_or(LoaderError::MissingSource)?.to_string();

        let (generation, token) = {
            let mut inner = self.shared.inner.lock();
            inner.props = props;

            if inner.source == source || inner.state == LoadState::Failed {
                return Ok(false);
            }

            if self.shared.config.cancel_stale {
                inner.current.cancel();
            }
            inner.generation += 1;
            inner.source.clone_from(&source);
            inner.current = self.shared.teardown.child_token();
            (inner.generation, inner.current.clone())
        };

        tracing::debug!(source = %source, generation, "image source changed");
        tokio::spawn(run_request(Arc::clone(&self.shared), generation, source, token));

        Ok(true)
    }

    /// Render the placeholder or the loaded image
    #[must_use]
    pub fn render(&self) -> Rendered {
        let inner = self.shared.inner.lock();
        match (&inner.state, &inner.image) {
            (LoadState::Loaded, Some(image)) => {
                Rendered::Image(render::image(&image.url, &inner.props))
            }
            _ => Rendered::Placeholder(render::placeholder(&inner.props)),
        }
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> ImageStatus {
        self.shared.status.borrow().clone()
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> LoadState {
        self.shared.inner.lock().state
    }

    /// Source currently tracked
    #[must_use]
    pub fn source(&self) -> String {
        self.shared.inner.lock().source.clone()
    }

    /// Bytes of the displayed image, while its blob is live
    #[must_use]
    pub fn image_bytes(&self) -> Option<Arc<[u8]>> {
        let inner = self.shared.inner.lock();
        let image = inner.image.as_ref()?;
        self.shared.pool.blobs().resolve(&image.url)
    }

    /// Watch status changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ImageStatus> {
        self.shared.status.subscribe()
    }

    /// Wait until the controller leaves `Loading`
    pub async fn wait_settled(&self) -> ImageStatus {
        let mut rx = self.subscribe();
        let status = match rx.wait_for(|status| status.state.is_terminal()).await {
            Ok(status) => status.clone(),
            Err(_) => self.status(),
        };
        status
    }
}

impl Drop for ImageLoadController {
    fn drop(&mut self) {
        self.shared.teardown.cancel();

        let inner = self.shared.inner.lock();
        if let Some(image) = &inner.image {
            self.shared.pool.blobs().revoke(&image.url);
        }
    }
}

impl std::fmt::Debug for ImageLoadController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoadController")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Request task: acquire, dispatch, await, hand the result over
async fn run_request(
    shared: Arc<Shared>,
    generation: u64,
    source: String,
    cancel: CancellationToken,
) {
    let unit = tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        unit = shared.pool.acquire_with_policy() => unit,
    };

    let dispatch = match shared
        .pool
        .dispatch_cancellable(&unit, &source, cancel.clone())
        .await
    {
        Ok(dispatch) => dispatch,
        Err(e) => {
            tracing::error!(source = %source, error = %e, "dispatch failed");
            shared.release(&unit);
            shared.on_fetch_failed(generation, &source, &cancel).await;
            return;
        }
    };

    let request = dispatch.id();
    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            tracing::debug!(%request, "request cancelled");
            shared.release(&unit);
            return;
        }
        outcome = dispatch.wait() => outcome,
    };

    match outcome {
        Some(blob) => shared.on_worker_result(&unit, generation, &source, blob, &cancel).await,
        None => {
            shared.release(&unit);
            shared.on_fetch_failed(generation, &source, &cancel).await;
        }
    }
}

impl Shared {
    fn release(&self, unit: &WorkerHandle) {
        // A fallback handle shares its unit with the request that marked it.
        if unit.is_exclusive() {
            self.pool.release(unit.index());
        }
    }

    fn is_stale(&self, generation: u64, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return true;
        }
        self.config.cancel_stale && self.inner.lock().generation != generation
    }

    async fn on_worker_result(
        &self,
        unit: &WorkerHandle,
        generation: u64,
        source: &str,
        blob: BlobUrl,
        cancel: &CancellationToken,
    ) {
        self.release(unit);

        if self.is_stale(generation, cancel) {
            tracing::debug!(source, generation, "discarding stale result");
            self.pool.blobs().revoke(blob.as_str());
            return;
        }

        self.display_image(generation, source, blob.as_str(), cancel)
            .await;
    }

    async fn on_fetch_failed(&self, generation: u64, source: &str, cancel: &CancellationToken) {
        if self.is_stale(generation, cancel) {
            return;
        }

        match self.config.failure_policy {
            // Show the raw reference; it will not resolve, which settles as a broken image.
            FailurePolicy::Degrade => self.display_image(generation, source, source, cancel).await,
            FailurePolicy::Surface => self.settle(
                generation,
                source,
                source,
                Err(LoaderError::FetchFailed {
                    url: source.to_string(),
                }),
            ),
        }
    }

    async fn display_image(
        &self,
        generation: u64,
        source: &str,
        url: &str,
        cancel: &CancellationToken,
    ) {
        let result = match self.pool.blobs().resolve(url) {
            None => Err(DecodeError::Unresolvable(url.to_string())),
            Some(bytes) if self.decoder.can_decode() => self.decoder.decode(bytes).await,
            Some(bytes) => self.decoder.load(&bytes),
        };

        if self.is_stale(generation, cancel) {
            tracing::debug!(source, generation, "discarding stale decode");
            self.pool.blobs().revoke(url);
            return;
        }

        self.settle(generation, source, url, result.map_err(LoaderError::from));
    }

    fn settle(
        &self,
        generation: u64,
        source: &str,
        url: &str,
        result: Result<ImageInfo, LoaderError>,
    ) {
        let mut inner = self.inner.lock();

        if self.config.cancel_stale && inner.generation != generation {
            self.pool.blobs().revoke(url);
            return;
        }

        let info = match result {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(source, url, error = %e, "failed loading image");
                inner.last_error = Some(e.to_string());
                if self.config.failure_policy == FailurePolicy::Surface {
                    if inner.state == LoadState::Loading {
                        inner.state = LoadState::Failed;
                    }
                    self.pool.blobs().revoke(url);
                    self.status.send_replace(inner.snapshot());
                    return;
                }
                None
            }
        };

        if inner.state == LoadState::Failed {
            self.pool.blobs().revoke(url);
            return;
        }

        let previous = inner.image.replace(DisplayedImage {
            source: source.to_string(),
            url: url.to_string(),
            info,
        });
        if let Some(previous) = previous.filter(|previous| previous.url != url) {
            self.pool.blobs().revoke(&previous.url);
        }

        if inner.state == LoadState::Loading {
            inner.state = LoadState::Loaded;
            tracing::debug!(source, "image loaded");
        }

        self.status.send_replace(inner.snapshot());
    }
}
