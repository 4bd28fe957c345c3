//! Errors produced by [`ApiClient`](super::ApiClient).

use std::time::Duration;

use thiserror::Error;

use crate::http::{StatusCode, WireError};

/// A failed marketplace API call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed response: {0}")]
    Wire(#[from] WireError),

    #[error("connection closed before the response was complete")]
    Incomplete,

    #[error("HTTP {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("backend error {code}: {message}")]
    Backend { code: i32, message: String },

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("response envelope carried no data")]
    MissingData,

    #[error("response exceeds maximum allowed size of {limit} bytes")]
    ResponseTooLarge { limit: usize },

    #[error("request timed out after {after:?}")]
    TimedOut { after: Duration },

    #[error("invalid client config: {reason}")]
    Config { reason: String },
}

impl ApiError {
    /// `true` when the backend rejected the credentials, either with a 401
    /// status or a 401 envelope code. Callers should drop their token.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status == StatusCode::UNAUTHORIZED,
            Self::Backend { code, .. } => *code == 401,
            _ => false,
        }
    }

    /// `true` for a 404 status or envelope code.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status == StatusCode::NOT_FOUND,
            Self::Backend { code, .. } => *code == 404,
            _ => false,
        }
    }

    /// `true` for failures that happened before any response was decoded.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Io(_) | Self::Incomplete | Self::TimedOut { .. }
        )
    }
}
