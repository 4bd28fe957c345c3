//! Read-through caching with time-to-live invalidation.
//!
//! ## Pieces
//!
//! - [`Clock`]: injectable time source ([`SystemClock`], [`ManualClock`]).
//! - [`EntryStore`]: key → (value, insertion time) map.
//! - [`TtlCache`]: hit/miss decisions, fetch on miss, single-flight
//!   de-duplication, invalidation.
//! - [`KeyedCache`]: `Fn(Id)` lookups on a namespace of a shared engine.
//! - [`CacheConfig`] / [`FetchOptions`]: engine defaults and per-call
//!   overrides.
//!
//! ## Freshness
//!
//! An entry written at `T` is fresh while `now - T < ttl`. Stale entries are
//! ignored by reads but stay stored until a later fetch overwrites them or
//! they are invalidated. A failed fetch never touches the stored entry.

mod clock;
mod config;
mod engine;
mod error;
mod keyed;
mod stats;
mod store;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use config::{CacheConfig, CacheConfigBuilder, ConfigError, DEFAULT_TTL};
pub use engine::{FetchOptions, TtlCache};
pub use error::CacheError;
pub use keyed::{KeyedCache, Namespaced};
pub use stats::CacheStats;
pub use store::{CacheEntry, EntryStore};
