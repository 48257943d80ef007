//! Error types for the worker pool
//!
//! Fetch failures stay inside the worker that hit them: they are logged and
//! the request is dropped. Only channel breakage and configuration problems
//! ever reach a caller.

/// Failure while fetching an image inside a worker unit
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, body read)
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server answered with a non-2xx status
    #[error("unexpected status {status} for {url}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// URL could not be fetched by this fetcher at all
    #[error("unsupported url: {0}")]
    Unsupported(String),

    /// Request was cancelled before it finished
    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Check if the failure came from a cancellation rather than the network
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Worker pool errors
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Handle points at a unit this pool does not own
    #[error("no worker unit at index {0}")]
    NoUnit(usize),

    /// Unit task is gone and its queue is closed
    #[error("communication failed: {0}")]
    CommunicationFailed(String),

    /// Pool configuration rejected at init
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Default fetcher could not be built
    #[error("fetcher setup failed: {0}")]
    Fetcher(#[from] FetchError),
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML document did not parse
    #[error("invalid toml config: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON document did not parse
    #[error("invalid json config: {0}")]
    Json(#[from] serde_json::Error),

    /// Parsed but semantically invalid
    #[error("invalid config: {0}")]
    Invalid(String),
}
