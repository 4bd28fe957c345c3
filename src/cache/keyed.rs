//! Lookups by identifier on a shared engine.
//!
//! A [`KeyedCache`] binds one fetch function of shape `Fn(Id) -> Future` to
//! a namespace on a [`TtlCache`] keyed by [`Namespaced`]. Several keyed
//! caches can share one engine; the namespace tag keeps their key spaces
//! apart even when two pools use the same identifier.

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use super::clock::{Clock, SystemClock};
use super::engine::{FetchOptions, TtlCache};
use super::error::CacheError;

/// A cache key tagged with the pool it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespaced<Id> {
    /// Pool discriminator, e.g. `"model"` or `"user"`.
    pub namespace: &'static str,
    /// Identifier inside the pool.
    pub id: Id,
}

impl<Id> Namespaced<Id> {
    /// Tags `id` with `namespace`.
    pub fn new(namespace: &'static str, id: Id) -> Self {
        Self { namespace, id }
    }
}

impl<Id: fmt::Display> fmt::Display for Namespaced<Id> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.id)
    }
}

type Fetcher<Id, V, E> = Arc<dyn Fn(Id) -> BoxFuture<'static, Result<V, E>> + Send + Sync>;

/// A [`TtlCache`] view with a fixed fetch function and key namespace.
///
/// # Examples
///
/// ```
/// use hubcache::cache::{CacheConfig, Namespaced, TtlCache};
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("not found")]
/// struct NotFound;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let engine: TtlCache<Namespaced<u32>, String, NotFound> = TtlCache::new(CacheConfig::default());
/// let titles = engine.keyed("title", |id: u32| async move { Ok(format!("model {id}")) });
/// let owners = engine.keyed("owner", |id: u32| async move { Ok(format!("user {id}")) });
///
/// // Same id, different pools.
/// assert_eq!(titles.get(7).await.unwrap().as_str(), "model 7");
/// assert_eq!(owners.get(7).await.unwrap().as_str(), "user 7");
/// # }
/// ```
pub struct KeyedCache<Id, V, E, C = SystemClock> {
    cache: TtlCache<Namespaced<Id>, V, E, C>,
    namespace: &'static str,
    fetcher: Fetcher<Id, V, E>,
}

impl<Id, V, E, C> Clone for KeyedCache<Id, V, E, C> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            namespace: self.namespace,
            fetcher: Arc::clone(&self.fetcher),
        }
    }
}

impl<Id, V, E, C> fmt::Debug for KeyedCache<Id, V, E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedCache")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl<Id, V, E, C> TtlCache<Namespaced<Id>, V, E, C>
where
    Id: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
    C: Clock,
{
    /// Binds `fetch` to `namespace` on this engine.
    ///
    /// Entries written through the returned cache live in this engine and
    /// expire independently per id.
    pub fn keyed<F, Fut>(&self, namespace: &'static str, fetch: F) -> KeyedCache<Id, V, E, C>
    where
        F: Fn(Id) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        KeyedCache {
            cache: self.clone(),
            namespace,
            fetcher: Arc::new(move |id| fetch(id).boxed()),
        }
    }
}

impl<Id, V, E, C> KeyedCache<Id, V, E, C>
where
    Id: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
    C: Clock,
{
    /// The namespace this view writes under.
    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    /// The engine behind this view.
    pub fn engine(&self) -> &TtlCache<Namespaced<Id>, V, E, C> {
        &self.cache
    }

    fn key(&self, id: Id) -> Namespaced<Id> {
        Namespaced::new(self.namespace, id)
    }

    /// Returns the value for `id`, fetching it on a miss.
    pub async fn get(&self, id: Id) -> Result<Arc<V>, CacheError<E>> {
        self.get_with(id, FetchOptions::new()).await
    }

    /// Fetches `id` regardless of freshness and stores the result.
    pub async fn refresh(&self, id: Id) -> Result<Arc<V>, CacheError<E>> {
        self.get_with(id, FetchOptions::forced()).await
    }

    /// Returns the value for `id` using explicit options.
    pub async fn get_with(&self, id: Id, options: FetchOptions) -> Result<Arc<V>, CacheError<E>> {
        let fetcher = Arc::clone(&self.fetcher);
        let key = self.key(id.clone());
        self.cache
            .get_or_fetch(key, move || fetcher(id), options)
            .await
    }

    /// Returns the value for `id` if it is fresh. Never fetches.
    pub fn peek(&self, id: &Id) -> Option<Arc<V>> {
        self.cache.peek(&self.key(id.clone()))
    }

    /// Removes the entry for `id`. Returns `true` if there was one.
    pub fn invalidate(&self, id: &Id) -> bool {
        self.cache.invalidate(&self.key(id.clone()))
    }

    /// Removes every entry in this namespace, leaving other pools on the
    /// same engine untouched.
    pub fn clear(&self) -> usize {
        let namespace = self.namespace;
        self.cache
            .invalidate_where(|key| key.namespace == namespace)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use thiserror::Error;

    use super::*;
    use crate::cache::{CacheConfig, ManualClock};

    #[derive(Debug, Error)]
    #[error("lookup failed")]
    struct LookupError;

    type Engine = TtlCache<Namespaced<u32>, String, LookupError, ManualClock>;

    fn engine() -> (Engine, ManualClock) {
        let clock = ManualClock::new();
        let config = CacheConfig::builder().ttl_millis(1000).build().unwrap();
        (TtlCache::with_clock(config, clock.clone()), clock)
    }

    fn counting(
        engine: &Engine,
        namespace: &'static str,
        calls: &Arc<AtomicUsize>,
    ) -> KeyedCache<u32, String, LookupError, ManualClock> {
        let calls = Arc::clone(calls);
        engine.keyed(namespace, move |id: u32| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(format!("{namespace}-{id}-v{n}")) }
        })
    }

    #[tokio::test]
    async fn same_id_in_different_namespaces_does_not_alias() {
        let (engine, _clock) = engine();
        let calls = Arc::new(AtomicUsize::new(0));
        let models = counting(&engine, "model", &calls);
        let users = counting(&engine, "user", &calls);

        assert_eq!(models.get(42).await.unwrap().as_str(), "model-42-v1");
        assert_eq!(users.get(42).await.unwrap().as_str(), "user-42-v2");
        assert_eq!(models.get(42).await.unwrap().as_str(), "model-42-v1");
        assert_eq!(engine.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn ids_expire_independently() {
        let (engine, clock) = engine();
        let calls = Arc::new(AtomicUsize::new(0));
        let models = counting(&engine, "model", &calls);

        models.get(1).await.unwrap();
        clock.advance_millis(600);
        models.get(2).await.unwrap();
        clock.advance_millis(600);

        assert!(models.peek(&1).is_none());
        assert!(models.peek(&2).is_some());
    }

    #[tokio::test]
    async fn refresh_and_invalidate() {
        let (engine, _clock) = engine();
        let calls = Arc::new(AtomicUsize::new(0));
        let models = counting(&engine, "model", &calls);

        models.get(5).await.unwrap();
        assert_eq!(models.refresh(5).await.unwrap().as_str(), "model-5-v2");

        assert!(models.invalidate(&5));
        assert!(!models.invalidate(&5));
        assert_eq!(models.get(5).await.unwrap().as_str(), "model-5-v3");
    }

    #[tokio::test]
    async fn clear_only_touches_own_namespace() {
        let (engine, _clock) = engine();
        let calls = Arc::new(AtomicUsize::new(0));
        let models = counting(&engine, "model", &calls);
        let users = counting(&engine, "user", &calls);

        models.get(1).await.unwrap();
        models.get(2).await.unwrap();
        users.get(1).await.unwrap();

        assert_eq!(models.clear(), 2);
        assert!(users.peek(&1).is_some());
        assert!(models.peek(&1).is_none());
    }

    #[test]
    fn namespaced_display() {
        assert_eq!(Namespaced::new("model", 7).to_string(), "model:7");
    }
}
