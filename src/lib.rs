//! # hubcache
//!
//! Read-through TTL caching for a model-sharing marketplace client.
//!
//! [`cache::TtlCache`] returns fresh entries from memory, fetches on a miss,
//! and collapses concurrent fetches for one key into a single request.
//! Around it sit typed records ([`types`]), a small HTTP/1.1 JSON client
//! ([`client`]) and [`catalog::ModelCatalog`], which reads through the cache
//! and invalidates it after writes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hubcache::cache::CacheConfig;
//! use hubcache::catalog::ModelCatalog;
//! use hubcache::client::{ApiClient, ClientConfig};
//! use hubcache::types::{ModelId, PageQuery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::new(ClientConfig::new("127.0.0.1:8080").token("secret"))?;
//!     let catalog = ModelCatalog::new(client, CacheConfig::default());
//!
//!     let page = catalog.fetch_models(PageQuery::first(), false).await?;
//!     println!("{} models", page.total);
//!
//!     catalog.add_favorite(ModelId::from("3f2a")).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod catalog;
pub mod client;
pub mod http;
pub mod types;

pub use cache::{CacheConfig, CacheError, FetchOptions, KeyedCache, TtlCache};
pub use catalog::ModelCatalog;
pub use client::{ApiClient, ApiError, ClientConfig, Marketplace};
