//! The read-through TTL cache engine.
//!
//! [`TtlCache::get_or_fetch`] is the heart of the crate:
//!
//! 1. Unless the call forces a refresh, a fresh entry is returned straight
//!    away. The hit path takes a lock, compares two timestamps and returns;
//!    it never awaits.
//! 2. Otherwise the caller either joins the fetch already in flight for the
//!    key or, if there is none, registers a new one. Check and registration
//!    happen under one lock, so two racing callers can never both start a
//!    fetch for the same key.
//! 3. The fetch is a [`Shared`] future. Whoever polls it drives it, so the
//!    caller that started it can go away without stranding the others.
//! 4. On success the value is written with a fresh timestamp before any
//!    caller sees it. On failure the store is left alone and every caller
//!    gets the same error.
//! 5. If the fetch panics, its marker is removed before the panic resumes,
//!    so the next caller for the key starts a new fetch.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, error, warn};

use super::clock::{Clock, SystemClock};
use super::config::{CacheConfig, ConfigError};
use super::error::CacheError;
use super::stats::{CacheStats, MetricsCollector};
use super::store::{CacheEntry, EntryStore};

type FetchResult<V, E> = Result<Arc<V>, CacheError<E>>;

// One outstanding fetch, shared by every caller waiting on the same key.
type Flight<V, E> = Shared<BoxFuture<'static, FetchResult<V, E>>>;

/// Per-call options for [`TtlCache::get_or_fetch`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use hubcache::cache::FetchOptions;
///
/// let opts = FetchOptions::new().ttl(Duration::from_secs(30)).force_refresh(true);
/// assert!(opts.force_refresh);
/// assert_eq!(FetchOptions::forced(), FetchOptions::new().force_refresh(true));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Freshness window for this read. Falls back to [`CacheConfig::ttl`].
    pub ttl: Option<Duration>,

    /// Skip the freshness check and fetch. Still joins a fetch already in
    /// flight for the key.
    pub force_refresh: bool,

    /// Deadline for a fetch this call starts. Falls back to
    /// [`CacheConfig::fetch_timeout`]. Callers that join an existing fetch
    /// inherit its deadline.
    pub timeout: Option<Duration>,
}

impl FetchOptions {
    /// Options that defer everything to the engine configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for a forced refresh.
    pub fn forced() -> Self {
        Self::new().force_refresh(true)
    }

    /// Overrides the freshness window.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets whether the freshness check is skipped.
    #[must_use]
    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    /// Overrides the fetch deadline.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

struct State<K, V, E> {
    store: EntryStore<K, V>,
    in_flight: HashMap<K, Flight<V, E>>,
}

struct Inner<K, V, E, C> {
    state: Mutex<State<K, V, E>>,
    config: CacheConfig,
    clock: C,
    metrics: MetricsCollector,
}

impl<K, V, E, C> Inner<K, V, E, C>
where
    K: Eq + Hash,
{
    // Never held across an await. Updates under the lock are single map
    // operations, so a poisoned guard still holds consistent state.
    fn lock(&self) -> MutexGuard<'_, State<K, V, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read-through cache with per-key TTL and single-flight fetches.
///
/// `TtlCache` is a handle: clones share the same entries, in-flight table and
/// counters. Create one per data set at startup and pass clones to whoever
/// needs it.
///
/// # Type Parameters
///
/// - `K`: cache key, compared by value.
/// - `V`: cached payload, handed out as `Arc<V>`.
/// - `E`: error type of the fetch functions.
/// - `C`: time source, [`SystemClock`] unless a test injects another.
///
/// # Examples
///
/// ```
/// use hubcache::cache::{FetchOptions, TtlCache};
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("unreachable")]
/// struct Unreachable;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache: TtlCache<u32, String, Unreachable> = TtlCache::new(Default::default());
///
/// let value = cache
///     .get_or_fetch(42, || async { Ok("model 42".to_string()) }, FetchOptions::new())
///     .await
///     .unwrap();
/// assert_eq!(value.as_str(), "model 42");
///
/// // Second read is served from memory; this fetch never runs.
/// let again = cache
///     .get_or_fetch(42, || async { Err(Unreachable) }, FetchOptions::new())
///     .await
///     .unwrap();
/// assert_eq!(again.as_str(), "model 42");
/// # }
/// ```
pub struct TtlCache<K, V, E, C = SystemClock> {
    inner: Arc<Inner<K, V, E, C>>,
}

impl<K, V, E, C> Clone for TtlCache<K, V, E, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, E, C> fmt::Debug for TtlCache<K, V, E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl<K, V, E> TtlCache<K, V, E, SystemClock>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    /// Creates a cache on the system clock.
    ///
    /// `config` is used as given; call [`try_new`](Self::try_new) to have it
    /// validated.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, SystemClock::new())
    }

    /// Validates `config` and creates a cache on the system clock.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] from [`CacheConfig::validate`].
    pub fn try_new(config: CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config))
    }
}

impl<K, V, E, C> TtlCache<K, V, E, C>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
    C: Clock,
{
    /// Creates a cache reading time from `clock`.
    pub fn with_clock(config: CacheConfig, clock: C) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    store: EntryStore::new(),
                    in_flight: HashMap::new(),
                }),
                config,
                clock,
                metrics: MetricsCollector::default(),
            }),
        }
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Returns the value for `key`, fetching it if there is no fresh entry.
    ///
    /// `fetch` is only invoked if this call starts a new fetch. When a fetch
    /// for `key` is already in flight, `fetch` is dropped unused and this
    /// call resolves to that fetch's outcome.
    ///
    /// # Errors
    ///
    /// - [`CacheError::Fetch`]: the fetch function failed. Any previous
    ///   entry for `key` is left as it was.
    /// - [`CacheError::Timeout`]: the fetch outlived its deadline.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: K,
        fetch: F,
        options: FetchOptions,
    ) -> Result<Arc<V>, CacheError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let flight = {
            let mut state = self.inner.lock();

            if !options.force_refresh {
                let ttl = options.ttl.unwrap_or(self.inner.config.ttl);
                let now = self.inner.clock.now();
                if let Some(entry) = state.store.get(&key) {
                    if entry.is_fresh(now, ttl) {
                        self.inner.metrics.record_hit();
                        debug!(key = ?key, age = ?entry.age(now), "cache hit");
                        return Ok(Arc::clone(entry.value()));
                    }
                }
                self.inner.metrics.record_miss();
            }

            match state.in_flight.get(&key).cloned() {
                Some(flight) => {
                    self.inner.metrics.record_coalesced();
                    debug!(key = ?key, "joining in-flight fetch");
                    flight
                }
                None => {
                    let timeout = options.timeout.or(self.inner.config.fetch_timeout);
                    let flight = self.start_flight(key.clone(), fetch, timeout);
                    state.in_flight.insert(key, flight.clone());
                    flight
                }
            }
        };

        flight.await
    }

    // Builds the shared fetch. `fetch` is not called until the first poll,
    // which happens after the state lock has been released.
    fn start_flight<F, Fut>(&self, key: K, fetch: F, timeout: Option<Duration>) -> Flight<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        self.inner.metrics.record_fetch();
        debug!(key = ?key, timeout = ?timeout, "starting fetch");

        // Weak so that a flight parked in the in-flight table does not keep
        // its own cache alive.
        let inner: Weak<Inner<K, V, E, C>> = Arc::downgrade(&self.inner);

        async move {
            let run = async move {
                match timeout {
                    Some(after) => match tokio::time::timeout(after, fetch()).await {
                        Ok(result) => result.map_err(|err| CacheError::Fetch(Arc::new(err))),
                        Err(_) => Err(CacheError::Timeout { after }),
                    },
                    None => fetch()
                        .await
                        .map_err(|err| CacheError::Fetch(Arc::new(err))),
                }
            };

            let outcome = match AssertUnwindSafe(run).catch_unwind().await {
                Ok(outcome) => outcome.map(Arc::new),
                Err(payload) => {
                    if let Some(inner) = inner.upgrade() {
                        abandon(&inner, &key);
                    }
                    panic::resume_unwind(payload)
                }
            };

            if let Some(inner) = inner.upgrade() {
                settle(&inner, key, &outcome);
            }
            outcome
        }
        .boxed()
        .shared()
    }

    /// Returns the value for `key` if a fresh entry exists. Never fetches.
    pub fn peek(&self, key: &K) -> Option<Arc<V>> {
        let state = self.inner.lock();
        let now = self.inner.clock.now();
        state
            .store
            .get(key)
            .filter(|entry| entry.is_fresh(now, self.inner.config.ttl))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Returns `true` if `key` has a fresh entry under the default TTL.
    pub fn contains_fresh(&self, key: &K) -> bool {
        self.peek(key).is_some()
    }

    /// Removes the entry for `key`. Returns `true` if there was one.
    ///
    /// A fetch already in flight for `key` is not cancelled and will still
    /// write its result when it completes.
    pub fn invalidate(&self, key: &K) -> bool {
        let removed = self.inner.lock().store.remove(key);
        if removed {
            self.inner.metrics.record_invalidations(1);
            debug!(key = ?key, "entry invalidated");
        }
        removed
    }

    /// Removes every entry whose key matches `predicate`, returning how many
    /// were removed. In-flight fetches are not cancelled.
    pub fn invalidate_where<P>(&self, predicate: P) -> usize
    where
        P: FnMut(&K) -> bool,
    {
        let removed = self.inner.lock().store.remove_where(predicate);
        self.inner.metrics.record_invalidations(removed);
        debug!(removed, "entries invalidated by predicate");
        removed
    }

    /// Removes every entry. In-flight fetches are not cancelled.
    pub fn clear(&self) {
        let removed = self.inner.lock().store.clear();
        self.inner.metrics.record_invalidations(removed);
        debug!(removed, "cache cleared");
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.inner.lock().store.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().store.is_empty()
    }

    /// Number of fetches currently outstanding.
    pub fn in_flight(&self) -> usize {
        self.inner.lock().in_flight.len()
    }

    /// Returns a snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        let (size, in_flight) = {
            let state = self.inner.lock();
            (state.store.len(), state.in_flight.len())
        };
        self.inner.metrics.snapshot(size, in_flight)
    }
}

// Records the outcome of a finished fetch: clears the in-flight marker and,
// on success only, writes the entry.
fn settle<K, V, E, C>(inner: &Inner<K, V, E, C>, key: K, outcome: &FetchResult<V, E>)
where
    K: Eq + Hash + fmt::Debug,
    E: std::error::Error,
    C: Clock,
{
    let mut state = inner.lock();
    state.in_flight.remove(&key);

    match outcome {
        Ok(value) => {
            let now = inner.clock.now();
            debug!(key = ?key, at = %now, "fetch stored");
            state.store.put(key, CacheEntry::new(Arc::clone(value), now));
        }
        Err(CacheError::Timeout { after }) => {
            inner.metrics.record_timeout();
            warn!(key = ?key, after = ?after, "fetch timed out");
        }
        Err(CacheError::Fetch(err)) => {
            inner.metrics.record_failure();
            warn!(key = ?key, error = %err, "fetch failed");
        }
    }
}

// The fetch panicked. Nothing is stored; the marker goes so the key can be
// fetched again.
fn abandon<K, V, E, C>(inner: &Inner<K, V, E, C>, key: &K)
where
    K: Eq + Hash + fmt::Debug,
{
    inner.lock().in_flight.remove(key);
    inner.metrics.record_failure();
    error!(key = ?key, "fetch panicked");
}
