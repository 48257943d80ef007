//! Loader and combined prefetch configuration

use imgworker_pool::{ConfigError, PoolConfig};
use serde::{Deserialize, Serialize};

/// How a controller reacts to a failed fetch or decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// End `Loaded` anyway and show the (possibly broken) reference
    #[default]
    Degrade,
    /// End `Failed` and keep showing the placeholder
    Surface,
}

/// Image load controller configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Failure handling
    pub failure_policy: FailurePolicy,
    /// Cancel the in-flight request when the source changes
    ///
    /// When `false`, every result is applied in delivery order and the one
    /// delivered last wins, whatever order the sources were set in.
    pub cancel_stale: bool,
}

impl LoaderConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With failure policy
    #[inline]
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// With stale request cancellation
    #[inline]
    #[must_use]
    pub fn with_cancel_stale(mut self, cancel_stale: bool) -> Self {
        self.cancel_stale = cancel_stale;
        self
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Degrade,
            cancel_stale: true,
        }
    }
}

/// Everything needed to stand up a [`crate::Prefetcher`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    /// Worker pool settings
    pub pool: PoolConfig,
    /// Controller settings
    pub loader: LoaderConfig,
}

impl PrefetchConfig {
    /// Parse from a TOML document with `[pool]` and `[loader]` tables
    ///
    /// # Errors
    /// - `ConfigError::Toml` if the document does not parse
    /// - `ConfigError::Invalid` if the values are unusable
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from a JSON document
    ///
    /// # Errors
    /// - `ConfigError::Json` if the document does not parse
    /// - `ConfigError::Invalid` if the values are unusable
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all sections
    ///
    /// # Errors
    /// - `ConfigError::Invalid` from the pool section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pool.validate()
    }
}
