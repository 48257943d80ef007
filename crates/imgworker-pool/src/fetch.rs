//! Fetching image bodies
//!
//! Worker units only see the [`Fetcher`] trait; [`HttpFetcher`] is the
//! network implementation backed by [`reqwest`].

use crate::config::PoolConfig;
use crate::error::FetchError;
use async_trait::async_trait;

/// Source of raw image bytes for a URL
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// Fetch the full body behind `url`
    ///
    /// # Errors
    /// Any network, status or protocol failure; the worker logs it and drops
    /// the request.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// HTTP fetcher
///
/// Requests go out as plain cross-origin GETs: no cookies, no custom
/// credentials. A non-2xx answer counts as a failure.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a client from the pool's user agent and timeout
    ///
    /// # Errors
    /// - `FetchError::Request` if the TLS backend cannot be initialized
    pub fn new(config: &PoolConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { client })
    }

    /// Reuse an existing client (shares its connection pool)
    #[inline]
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        tracing::trace!(url, bytes = body.len(), "fetched body");
        Ok(body.to_vec())
    }
}
