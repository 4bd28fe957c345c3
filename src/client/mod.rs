//! Marketplace REST client.
//!
//! [`ApiClient`] speaks JSON over HTTP/1.1 to the marketplace backend, one
//! connection per request. [`Marketplace`] is the seam the catalog fetches
//! through, so tests can swap in an in-memory backend.
//!
//! | Operation          | Route                                  |
//! |--------------------|----------------------------------------|
//! | list models        | `GET /models?page=&page_size=&search=` |
//! | list user models   | `GET /users/{id}/models?page=&page_size=` |
//! | model detail       | `GET /models/{id}`                     |
//! | create model       | `POST /models`                         |
//! | update model       | `PUT /models/{id}`                     |
//! | delete model       | `DELETE /models/{id}`                  |
//! | add favorite       | `POST /models/{id}/favorite`           |
//! | remove favorite    | `DELETE /models/{id}/favorite`         |
//! | record download    | `POST /models/{id}/download`           |
//! | list favorites     | `GET /favorites?page=&page_size=`      |
//! | list announcements | `GET /announcements`                   |

use std::pin::Pin;

mod api;
mod config;
mod error;

pub use api::ApiClient;
pub use config::{ClientConfig, DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_REQUEST_TIMEOUT};
pub use error::ApiError;

use crate::types::{
    Announcement, DownloadTicket, Favorite, Model, ModelDetail, ModelId, ModelUpdate, NewModel,
    Page, PageQuery, UserId,
};

/// A boxed, owned future resolving to an API result.
pub type ApiFuture<T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send>>;

/// The backend operations the catalog depends on.
///
/// Returned futures own everything they need, so they can be handed to a
/// cache as fetch functions and polled after `self` is borrowed elsewhere.
pub trait Marketplace: Send + Sync {
    /// Public, approved models, newest first.
    fn list_models(&self, query: PageQuery) -> ApiFuture<Page<Model>>;

    /// Models uploaded by `user`.
    fn list_user_models(&self, user: UserId, query: PageQuery) -> ApiFuture<Page<Model>>;

    fn get_model(&self, id: ModelId) -> ApiFuture<ModelDetail>;

    /// Active announcements.
    fn list_announcements(&self) -> ApiFuture<Vec<Announcement>>;

    /// The authenticated user's favorites.
    fn list_favorites(&self, query: PageQuery) -> ApiFuture<Page<Favorite>>;

    fn create_model(&self, model: NewModel) -> ApiFuture<Model>;

    fn update_model(&self, id: ModelId, update: ModelUpdate) -> ApiFuture<Model>;

    fn delete_model(&self, id: ModelId) -> ApiFuture<()>;

    fn add_favorite(&self, id: ModelId) -> ApiFuture<()>;

    fn remove_favorite(&self, id: ModelId) -> ApiFuture<()>;

    /// Bumps the download counter and returns where to fetch the file.
    fn record_download(&self, id: ModelId) -> ApiFuture<DownloadTicket>;
}

impl<M: Marketplace + ?Sized> Marketplace for std::sync::Arc<M> {
    fn list_models(&self, query: PageQuery) -> ApiFuture<Page<Model>> {
        (**self).list_models(query)
    }

    fn list_user_models(&self, user: UserId, query: PageQuery) -> ApiFuture<Page<Model>> {
        (**self).list_user_models(user, query)
    }

    fn get_model(&self, id: ModelId) -> ApiFuture<ModelDetail> {
        (**self).get_model(id)
    }

    fn list_announcements(&self) -> ApiFuture<Vec<Announcement>> {
        (**self).list_announcements()
    }

    fn list_favorites(&self, query: PageQuery) -> ApiFuture<Page<Favorite>> {
        (**self).list_favorites(query)
    }

    fn create_model(&self, model: NewModel) -> ApiFuture<Model> {
        (**self).create_model(model)
    }

    fn update_model(&self, id: ModelId, update: ModelUpdate) -> ApiFuture<Model> {
        (**self).update_model(id, update)
    }

    fn delete_model(&self, id: ModelId) -> ApiFuture<()> {
        (**self).delete_model(id)
    }

    fn add_favorite(&self, id: ModelId) -> ApiFuture<()> {
        (**self).add_favorite(id)
    }

    fn remove_favorite(&self, id: ModelId) -> ApiFuture<()> {
        (**self).remove_favorite(id)
    }

    fn record_download(&self, id: ModelId) -> ApiFuture<DownloadTicket> {
        (**self).record_download(id)
    }
}
