//! Pool configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What `acquire` does when every unit is busy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaturationPolicy {
    /// Hand out unit 0 without marking it; requests pile up on that unit
    #[default]
    Fallback,
    /// Wait until a unit is released
    Queue,
}

/// Worker pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker units, fixed for the pool's lifetime
    pub size: usize,
    /// Behavior when all units are busy
    pub saturation: SaturationPolicy,
    /// Pending requests each unit buffers before `dispatch` waits
    pub queue_capacity: usize,
    /// Per-request network timeout in milliseconds
    pub request_timeout_ms: u64,
    /// User agent sent with every fetch
    pub user_agent: String,
}

impl PoolConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// One unit per available core
    #[must_use]
    pub fn from_hardware() -> Self {
        let size = std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get);
        Self::default().with_size(size)
    }

    /// With number of units
    #[inline]
    #[must_use]
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// With saturation policy
    #[inline]
    #[must_use]
    pub fn with_saturation(mut self, saturation: SaturationPolicy) -> Self {
        self.saturation = saturation;
        self
    }

    /// With per-unit queue capacity
    #[inline]
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// With request timeout
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With user agent
    #[inline]
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Request timeout as a duration
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Reject configurations the pool cannot run with
    ///
    /// # Errors
    /// - `ConfigError::Invalid` for a zero-sized pool, zero queue capacity or
    ///   a zero request timeout
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size == 0 {
            return Err(ConfigError::Invalid("pool size must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue capacity must be at least 1".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("request timeout must be at least 1ms".into()));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 1,
            saturation: SaturationPolicy::Fallback,
            queue_capacity: 16,
            request_timeout_ms: 30_000,
            user_agent: concat!("imgworker/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
