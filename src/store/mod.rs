//! Advert persistence.
//!
//! The crawler only depends on [`AdvertStore`]; [`SqliteStore`] is the
//! implementation used by the binary.

mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Advert, AdvertFilter, FilterOptions};

pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("store connection lock is poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Document store for adverts, keyed by the site's external id
#[async_trait]
pub trait AdvertStore: Send + Sync {
    /// Look up a stored advert by the site's id
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Advert>>;

    /// Insert the advert, or overwrite the stored one when `id` is already set.
    /// On insert the store assigns `id`.
    async fn save(&self, advert: &mut Advert) -> Result<()>;

    /// All adverts matching the filter, oldest publication first
    async fn find(&self, filter: &AdvertFilter) -> Result<Vec<Advert>>;

    /// Distinct values for filter menus
    async fn filter_options(&self) -> Result<FilterOptions>;
}
