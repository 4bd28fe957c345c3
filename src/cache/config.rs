//! Cache configuration and its builder.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default freshness window: five minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Rejected cache configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ttl must be greater than zero")]
    ZeroTtl,

    #[error("fetch timeout must be greater than zero")]
    ZeroTimeout,

    #[error("invalid cache config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Engine-wide defaults.
///
/// Per-call overrides live in [`FetchOptions`](super::FetchOptions).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use hubcache::cache::CacheConfig;
///
/// let config = CacheConfig::builder()
///     .ttl(Duration::from_secs(60))
///     .fetch_timeout(Duration::from_secs(10))
///     .build()
///     .unwrap();
/// assert_eq!(config.ttl, Duration::from_secs(60));
///
/// assert!(CacheConfig::builder().ttl(Duration::ZERO).build().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long an entry stays fresh after it is written.
    pub ttl: Duration,

    /// Deadline after which an outstanding fetch is reported as failed.
    /// `None` lets fetches run to completion.
    pub fetch_timeout: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            fetch_timeout: None,
        }
    }
}

impl CacheConfig {
    /// Creates a builder starting from the defaults.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Default configuration with a different TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            ..Self::default()
        }
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ZeroTtl`] or [`ConfigError::ZeroTimeout`] if either
    /// duration is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl.is_zero() {
            return Err(ConfigError::ZeroTtl);
        }
        if self.fetch_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Parses and validates a JSON document such as
    /// `{"ttl_ms": 60000, "fetch_timeout_ms": 5000}`.
    ///
    /// Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: RawCacheConfig = serde_json::from_str(json)?;
        let config = Self::from(raw);
        config.validate()?;
        Ok(config)
    }
}

// Wire shape: durations as integer milliseconds.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCacheConfig {
    #[serde(default = "default_ttl_ms")]
    ttl_ms: u64,
    #[serde(default)]
    fetch_timeout_ms: Option<u64>,
}

fn default_ttl_ms() -> u64 {
    DEFAULT_TTL.as_millis() as u64
}

impl From<RawCacheConfig> for CacheConfig {
    fn from(raw: RawCacheConfig) -> Self {
        Self {
            ttl: Duration::from_millis(raw.ttl_ms),
            fetch_timeout: raw.fetch_timeout_ms.map(Duration::from_millis),
        }
    }
}

/// Fluent builder for [`CacheConfig`].
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Sets the freshness window.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = ttl;
        self
    }

    /// Sets the freshness window in milliseconds.
    #[must_use]
    pub fn ttl_millis(self, millis: u64) -> Self {
        self.ttl(Duration::from_millis(millis))
    }

    /// Sets a deadline for every fetch.
    #[must_use]
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = Some(timeout);
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<CacheConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_five_minutes_without_timeout() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(300));
        assert!(config.fetch_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_sets_fields() {
        let config = CacheConfig::builder()
            .ttl_millis(1000)
            .fetch_timeout(Duration::from_millis(250))
            .build()
            .unwrap();
        assert_eq!(config.ttl, Duration::from_millis(1000));
        assert_eq!(config.fetch_timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn zero_values_rejected() {
        assert!(matches!(
            CacheConfig::builder().ttl(Duration::ZERO).build(),
            Err(ConfigError::ZeroTtl)
        ));
        assert!(matches!(
            CacheConfig::builder().fetch_timeout(Duration::ZERO).build(),
            Err(ConfigError::ZeroTimeout)
        ));
    }

    #[test]
    fn from_json_fills_defaults() {
        let config = CacheConfig::from_json(r#"{"fetch_timeout_ms": 5000}"#).unwrap();
        assert_eq!(config.ttl, DEFAULT_TTL);
        assert_eq!(config.fetch_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn from_json_validates() {
        assert!(matches!(
            CacheConfig::from_json(r#"{"ttl_ms": 0}"#),
            Err(ConfigError::ZeroTtl)
        ));
        assert!(matches!(
            CacheConfig::from_json(r#"{"ttl": 5}"#),
            Err(ConfigError::Parse(_))
        ));
    }
}
