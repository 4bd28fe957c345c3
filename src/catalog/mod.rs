//! Cached access to marketplace data.
//!
//! [`ModelCatalog`] is the data-access layer views read through. Reads go
//! through read-through TTL caches; writes go straight to the backend and,
//! once they succeed, drop whatever cached data they made stale.
//!
//! | Write            | Invalidates                               |
//! |------------------|-------------------------------------------|
//! | create model     | every list page                           |
//! | update model     | its detail, every list page, favorites    |
//! | delete model     | its detail, every list page, favorites    |
//! | add/remove fav   | its detail, favorites                     |
//! | record download  | its detail                                |
//!
//! A failed write invalidates nothing.

use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::{
    CacheConfig, CacheError, CacheStats, Clock, FetchOptions, KeyedCache, Namespaced, SystemClock,
    TtlCache,
};
use crate::client::{ApiError, Marketplace};
use crate::types::{
    Announcement, DownloadTicket, Favorite, Model, ModelDetail, ModelId, ModelUpdate, NewModel,
    Page, PageQuery, UserId,
};

/// Result of a catalog read.
pub type CatalogResult<T> = Result<Arc<T>, CacheError<ApiError>>;

// Cache key of a model list page. Public listings and per-user listings
// share one engine, so the owner is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ListKey {
    Public(PageQuery),
    ByUser(UserId, PageQuery),
}

/// Counters of each cache the catalog owns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub lists: CacheStats,
    pub details: CacheStats,
    pub announcements: CacheStats,
    pub favorites: CacheStats,
}

/// Marketplace data behind per-data-set TTL caches.
///
/// Cheap to clone; clones share caches and backend.
///
/// # Examples
///
/// ```rust,no_run
/// use hubcache::cache::CacheConfig;
/// use hubcache::catalog::ModelCatalog;
/// use hubcache::client::{ApiClient, ClientConfig};
/// use hubcache::types::{ModelId, PageQuery};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = ApiClient::new(ClientConfig::new("127.0.0.1:8080"))?;
///     let catalog = ModelCatalog::new(client, CacheConfig::default());
///
///     let page = catalog.fetch_models(PageQuery::first(), false).await?;
///     if let Some(model) = page.items.first() {
///         let detail = catalog.fetch_model(model.id.clone(), false).await?;
///         println!("{} has {} favorites", detail.model.title, detail.favorite_count);
///     }
///
///     // Served from memory for the next five minutes.
///     catalog.fetch_models(PageQuery::first(), false).await?;
///     Ok(())
/// }
/// ```
pub struct ModelCatalog<C = SystemClock> {
    backend: Arc<dyn Marketplace>,
    lists: TtlCache<ListKey, Page<Model>, ApiError, C>,
    details: KeyedCache<ModelId, ModelDetail, ApiError, C>,
    announcements: TtlCache<(), Vec<Announcement>, ApiError, C>,
    favorites: TtlCache<PageQuery, Page<Favorite>, ApiError, C>,
}

impl<C> Clone for ModelCatalog<C> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            lists: self.lists.clone(),
            details: self.details.clone(),
            announcements: self.announcements.clone(),
            favorites: self.favorites.clone(),
        }
    }
}

impl<C> std::fmt::Debug for ModelCatalog<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCatalog")
            .field("lists", &self.lists)
            .field("details", &self.details)
            .finish_non_exhaustive()
    }
}

impl ModelCatalog<SystemClock> {
    /// Creates a catalog over `backend` on the system clock.
    pub fn new<B: Marketplace + 'static>(backend: B, config: CacheConfig) -> Self {
        Self::with_clock(backend, config, SystemClock::new())
    }
}

impl<C: Clock + Clone> ModelCatalog<C> {
    /// Creates a catalog whose caches all read time from `clock`.
    pub fn with_clock<B: Marketplace + 'static>(backend: B, config: CacheConfig, clock: C) -> Self {
        let backend: Arc<dyn Marketplace> = Arc::new(backend);

        let fetcher = Arc::clone(&backend);
        let details = TtlCache::<Namespaced<ModelId>, _, _, C>::with_clock(config.clone(), clock.clone())
            .keyed("model", move |id: ModelId| fetcher.get_model(id));

        Self {
            lists: TtlCache::with_clock(config.clone(), clock.clone()),
            announcements: TtlCache::with_clock(config.clone(), clock.clone()),
            favorites: TtlCache::with_clock(config, clock),
            details,
            backend,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    /// One page of public models. `force` skips the freshness check.
    pub async fn fetch_models(&self, query: PageQuery, force: bool) -> CatalogResult<Page<Model>> {
        let backend = Arc::clone(&self.backend);
        let key = ListKey::Public(query.clone());
        self.lists
            .get_or_fetch(key, move || backend.list_models(query), options(force))
            .await
    }

    /// One page of the models uploaded by `user`.
    pub async fn fetch_user_models(
        &self,
        user: UserId,
        query: PageQuery,
        force: bool,
    ) -> CatalogResult<Page<Model>> {
        let backend = Arc::clone(&self.backend);
        let key = ListKey::ByUser(user.clone(), query.clone());
        self.lists
            .get_or_fetch(
                key,
                move || backend.list_user_models(user, query),
                options(force),
            )
            .await
    }

    /// A model with its favorite count.
    pub async fn fetch_model(&self, id: ModelId, force: bool) -> CatalogResult<ModelDetail> {
        self.details.get_with(id, options(force)).await
    }

    /// Active announcements.
    pub async fn fetch_announcements(&self, force: bool) -> CatalogResult<Vec<Announcement>> {
        let backend = Arc::clone(&self.backend);
        self.announcements
            .get_or_fetch((), move || backend.list_announcements(), options(force))
            .await
    }

    /// One page of the current user's favorites.
    pub async fn fetch_favorites(&self, query: PageQuery, force: bool) -> CatalogResult<Page<Favorite>> {
        let backend = Arc::clone(&self.backend);
        self.favorites
            .get_or_fetch(
                query.clone(),
                move || backend.list_favorites(query),
                options(force),
            )
            .await
    }

    /// The cached detail for `id`, if fresh. Never fetches.
    pub fn peek_model(&self, id: &ModelId) -> Option<Arc<ModelDetail>> {
        self.details.peek(id)
    }

    // ── Writes ───────────────────────────────────────────────────────────────

    /// Uploads a new model.
    ///
    /// # Errors
    ///
    /// The backend's [`ApiError`]; no cache is touched in that case.
    pub async fn create_model(&self, model: NewModel) -> Result<Model, ApiError> {
        let created = self.backend.create_model(model).await?;
        info!(id = %created.id, "model created");
        self.drop_lists();
        Ok(created)
    }

    /// Applies `update` to model `id`.
    pub async fn update_model(&self, id: ModelId, update: ModelUpdate) -> Result<Model, ApiError> {
        let updated = self.backend.update_model(id.clone(), update).await?;
        info!(id = %id, "model updated");
        self.drop_model(&id);
        Ok(updated)
    }

    /// Deletes model `id`.
    pub async fn delete_model(&self, id: ModelId) -> Result<(), ApiError> {
        self.backend.delete_model(id.clone()).await?;
        info!(id = %id, "model deleted");
        self.drop_model(&id);
        Ok(())
    }

    /// Adds model `id` to the current user's favorites.
    pub async fn add_favorite(&self, id: ModelId) -> Result<(), ApiError> {
        self.backend.add_favorite(id.clone()).await?;
        self.drop_favorite(&id);
        Ok(())
    }

    /// Removes model `id` from the current user's favorites.
    pub async fn remove_favorite(&self, id: ModelId) -> Result<(), ApiError> {
        self.backend.remove_favorite(id.clone()).await?;
        self.drop_favorite(&id);
        Ok(())
    }

    /// Records a download of model `id`.
    pub async fn record_download(&self, id: ModelId) -> Result<DownloadTicket, ApiError> {
        let ticket = self.backend.record_download(id.clone()).await?;
        self.details.invalidate(&id);
        Ok(ticket)
    }

    /// Drops every cached entry. Fetches in flight still complete and store
    /// their results.
    pub fn clear_cache(&self) {
        self.lists.clear();
        self.details.clear();
        self.announcements.clear();
        self.favorites.clear();
        debug!("catalog cache cleared");
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            lists: self.lists.stats(),
            details: self.details.engine().stats(),
            announcements: self.announcements.stats(),
            favorites: self.favorites.stats(),
        }
    }

    fn drop_lists(&self) {
        let removed = self.lists.invalidate_where(|_| true);
        debug!(removed, "list pages invalidated");
    }

    fn drop_model(&self, id: &ModelId) {
        self.details.invalidate(id);
        self.drop_lists();
        self.favorites.clear();
    }

    fn drop_favorite(&self, id: &ModelId) {
        self.details.invalidate(id);
        self.favorites.clear();
    }
}

fn options(force: bool) -> FetchOptions {
    FetchOptions::new().force_refresh(force)
}
