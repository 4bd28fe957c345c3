//! Client connection settings.

use std::time::Duration;

use serde::Deserialize;

use super::ApiError;

/// Largest response the client buffers before giving up (8 MiB).
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

/// Per-request deadline used unless configured otherwise.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how [`ApiClient`](super::ApiClient) talks to the backend.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use hubcache::client::ClientConfig;
///
/// let config = ClientConfig::new("127.0.0.1:8080")
///     .token("secret")
///     .request_timeout(Duration::from_secs(3));
/// assert_eq!(config.base_path, "/api");
/// assert_eq!(config.url("/models"), "/api/models");
///
/// let parsed = ClientConfig::from_json(r#"{"addr": "hub.local:80", "request_timeout_ms": 500}"#).unwrap();
/// assert_eq!(parsed.request_timeout, Some(Duration::from_millis(500)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// `host:port` of the backend. Also sent as the `Host` header.
    pub addr: String,
    /// Prefix prepended to every route.
    pub base_path: String,
    /// Bearer token for authenticated routes.
    pub token: Option<String>,
    pub max_response_bytes: usize,
    /// `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl ClientConfig {
    /// Defaults for everything but the address.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            base_path: "/api".to_owned(),
            token: None,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    #[must_use]
    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn no_request_timeout(mut self) -> Self {
        self.request_timeout = None;
        self
    }

    /// Joins `route` onto the base path.
    pub fn url(&self, route: &str) -> String {
        let base = self.base_path.trim_end_matches('/');
        if route.starts_with('/') {
            format!("{base}{route}")
        } else {
            format!("{base}/{route}")
        }
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// [`ApiError::Config`] for an empty address, a base path without a
    /// leading `/`, a zero response limit or a zero timeout.
    pub fn validate(&self) -> Result<(), ApiError> {
        let reason = if self.addr.trim().is_empty() {
            "addr must not be empty"
        } else if !self.base_path.is_empty() && !self.base_path.starts_with('/') {
            "base_path must start with '/'"
        } else if self.max_response_bytes == 0 {
            "max_response_bytes must be greater than zero"
        } else if self.request_timeout.is_some_and(|t| t.is_zero()) {
            "request_timeout must be greater than zero"
        } else {
            return Ok(());
        };
        Err(ApiError::Config {
            reason: reason.to_owned(),
        })
    }

    /// Parses and validates a JSON document. Only `addr` is required;
    /// the timeout is given as `request_timeout_ms`.
    pub fn from_json(json: &str) -> Result<Self, ApiError> {
        let raw: RawClientConfig = serde_json::from_str(json).map_err(|e| ApiError::Config {
            reason: e.to_string(),
        })?;
        let mut config = Self::new(raw.addr);
        if let Some(base_path) = raw.base_path {
            config.base_path = base_path;
        }
        config.token = raw.token;
        if let Some(limit) = raw.max_response_bytes {
            config.max_response_bytes = limit;
        }
        if let Some(millis) = raw.request_timeout_ms {
            config.request_timeout = Some(Duration::from_millis(millis));
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawClientConfig {
    addr: String,
    #[serde(default)]
    base_path: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    max_response_bytes: Option<usize>,
    #[serde(default)]
    request_timeout_ms: Option<u64>,
}
