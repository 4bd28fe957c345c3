//! Errors reported by [`TtlCache::get_or_fetch`](super::TtlCache::get_or_fetch).

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Failure of a read-through fetch.
///
/// Every caller attached to the same fetch receives a clone of the same
/// error. The fetch function's own error is kept behind an [`Arc`] so it can
/// be shared without requiring `E: Clone`.
#[derive(Debug, Error)]
pub enum CacheError<E> {
    /// The fetch function failed. Displays exactly as the inner error.
    #[error(transparent)]
    Fetch(Arc<E>),

    /// The fetch did not settle before its deadline.
    #[error("fetch timed out after {after:?}")]
    Timeout { after: Duration },
}

impl<E> CacheError<E> {
    /// Returns the fetch function's error, if that is what failed.
    pub fn fetch_error(&self) -> Option<&E> {
        match self {
            Self::Fetch(err) => Some(err),
            Self::Timeout { .. } => None,
        }
    }

    /// Returns `true` for [`CacheError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl<E> Clone for CacheError<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Fetch(err) => Self::Fetch(Arc::clone(err)),
            Self::Timeout { after } => Self::Timeout { after: *after },
        }
    }
}
