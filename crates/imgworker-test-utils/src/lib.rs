//! Testing utilities for imgworker workspace
//!
//! Shared test helpers, fixtures, and assertions.

#![allow(missing_docs)]

use async_trait::async_trait;
use dashmap::DashMap;
use image::{DynamicImage, ImageFormat, RgbaImage};
use imgworker_loader::{
    Decoder, DecodeError, ImageCrateDecoder, ImageInfo, ImageLoadController, ImageStatus,
    LoaderConfig, Prefetcher,
};
use imgworker_pool::{FetchError, Fetcher, PoolConfig, WorkerPool};
use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

pub const GARBAGE: &[u8] = b"definitely not an image";

const WAIT: Duration = Duration::from_secs(5);

pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(RgbaImage::new(width, height))
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

#[derive(Debug, Clone)]
enum Outcome {
    Bytes(Vec<u8>),
    Fail,
}

#[derive(Debug)]
struct Script {
    outcome: Outcome,
    gate: Option<Arc<Notify>>,
}

/// Holds a scripted response back until opened
#[derive(Debug, Clone)]
pub struct Gate(Arc<Notify>);

impl Gate {
    pub fn open(&self) {
        self.0.notify_one();
    }
}

/// Fetcher answering from a per-URL script; unknown URLs fail
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    scripts: DashMap<String, Script>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, url: &str, bytes: Vec<u8>) {
        self.script(url, Outcome::Bytes(bytes), None);
    }

    pub fn fail(&self, url: &str) {
        self.script(url, Outcome::Fail, None);
    }

    pub fn gated(&self, url: &str, bytes: Vec<u8>) -> Gate {
        let gate = Arc::new(Notify::new());
        self.script(url, Outcome::Bytes(bytes), Some(Arc::clone(&gate)));
        Gate(gate)
    }

    pub fn gated_failure(&self, url: &str) -> Gate {
        let gate = Arc::new(Notify::new());
        self.script(url, Outcome::Fail, Some(Arc::clone(&gate)));
        Gate(gate)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn script(&self, url: &str, outcome: Outcome, gate: Option<Arc<Notify>>) {
        self.scripts.insert(url.to_string(), Script { outcome, gate });
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.lock().push(url.to_string());

        let script = self
            .scripts
            .get(url)
            .map(|script| (script.outcome.clone(), script.gate.clone()));
        let Some((outcome, gate)) = script else {
            return Err(FetchError::Unsupported(url.to_string()));
        };

        if let Some(gate) = gate {
            gate.notified().await;
        }

        match outcome {
            Outcome::Bytes(bytes) => Ok(bytes),
            Outcome::Fail => Err(FetchError::Status {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}

/// Wraps the `image` decoder and counts which path was taken
#[derive(Debug)]
pub struct RecordingDecoder {
    inner: ImageCrateDecoder,
    decodes: AtomicUsize,
    loads: AtomicUsize,
}

impl RecordingDecoder {
    pub fn full() -> Arc<Self> {
        Arc::new(Self::wrap(ImageCrateDecoder::full()))
    }

    pub fn header_only() -> Arc<Self> {
        Arc::new(Self::wrap(ImageCrateDecoder::header_only()))
    }

    fn wrap(inner: ImageCrateDecoder) -> Self {
        Self {
            inner,
            decodes: AtomicUsize::new(0),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Decoder for RecordingDecoder {
    fn can_decode(&self) -> bool {
        self.inner.can_decode()
    }

    async fn decode(&self, bytes: Arc<[u8]>) -> Result<ImageInfo, DecodeError> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        self.inner.decode(bytes).await
    }

    fn load(&self, bytes: &[u8]) -> Result<ImageInfo, DecodeError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(bytes)
    }
}

pub fn test_pool(size: usize, fetcher: Arc<ScriptedFetcher>) -> Arc<WorkerPool> {
    Arc::new(WorkerPool::init(PoolConfig::new().with_size(size), fetcher).unwrap())
}

pub fn test_prefetcher(pool: Arc<WorkerPool>, config: LoaderConfig) -> Prefetcher {
    Prefetcher::new(pool, Arc::new(ImageCrateDecoder::full()), config)
}

pub async fn settled(controller: &ImageLoadController) -> ImageStatus {
    tokio::time::timeout(WAIT, controller.wait_settled())
        .await
        .expect("controller never settled")
}

pub async fn wait_for_source(controller: &ImageLoadController, source: &str) -> ImageStatus {
    let mut rx = controller.subscribe();
    let status = tokio::time::timeout(
        WAIT,
        rx.wait_for(|status| status.displayed_source() == Some(source)),
    )
    .await
    .expect("source never displayed")
    .expect("status channel closed");
    status.clone()
}

/// Give spawned tasks a chance to run
pub async fn settle_tasks() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
