//! In-memory blob store
//!
//! Fetched bodies are parked here and handed back to callers as local
//! `blob:` URLs, so the controller only ever passes a short string around.

use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use ulid::Ulid;

/// Scheme prefix of every URL minted by a [`BlobStore`]
pub const BLOB_SCHEME: &str = "blob:imgworker/";

/// Local reference to bytes held by a [`BlobStore`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobUrl(String);

impl BlobUrl {
    fn mint() -> Self {
        Self(format!("{BLOB_SCHEME}{}", Ulid::new()))
    }

    /// URL as a string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if a string looks like a blob URL minted by this crate
    #[inline]
    #[must_use]
    pub fn is_blob_url(url: &str) -> bool {
        url.starts_with(BLOB_SCHEME)
    }
}

impl fmt::Display for BlobUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<BlobUrl> for String {
    fn from(url: BlobUrl) -> Self {
        url.0
    }
}

impl AsRef<str> for BlobUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Shared store of fetched image bodies keyed by blob URL
#[derive(Debug, Default)]
pub struct BlobStore {
    blobs: DashMap<String, Arc<[u8]>>,
}

impl BlobStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bytes and mint a URL for them
    pub fn create(&self, bytes: Vec<u8>) -> BlobUrl {
        let url = BlobUrl::mint();
        self.blobs.insert(url.0.clone(), bytes.into());
        url
    }

    /// Look up bytes by URL; anything that is not a live blob resolves to `None`
    #[must_use]
    pub fn resolve(&self, url: &str) -> Option<Arc<[u8]>> {
        self.blobs.get(url).map(|entry| Arc::clone(entry.value()))
    }

    /// Drop the bytes behind a URL; returns whether it was live
    pub fn revoke(&self, url: &str) -> bool {
        self.blobs.remove(url).is_some()
    }

    /// Number of live blobs
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Check if no blobs are live
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}
