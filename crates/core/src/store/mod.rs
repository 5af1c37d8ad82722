//! Generation-namespaced cache store.
//!
//! The store maps normalized request identities to captured responses,
//! namespaced by a generation tag so that install can populate a fresh
//! snapshot while an older one keeps serving, and activate can delete
//! everything but the active snapshot. Backed by SQLite with async access
//! via tokio-rusqlite.

pub mod connection;
pub mod entries;
pub mod key;
pub mod migrations;

pub use connection::SqliteStore;
pub use entries::{CacheUsage, CachedResponse};
pub use key::CacheKey;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Error;

/// One named+versioned snapshot of the cache store.
///
/// Exactly one generation is active at a time; changing either field
/// invalidates all previously stored generations on the next activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    pub name: String,
    pub version: String,
}

impl Generation {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: version.into() }
    }

    /// The tag under which this generation's entries are stored.
    pub fn tag(&self) -> String {
        format!("{}-v{}", self.name, self.version)
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Capability the strategy engine and lifecycle manager require from a
/// cache store. `SqliteStore` is the production backend; tests may supply
/// anything that honors last-write-wins on `put`.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Record a generation so it is enumerable even before any entry lands.
    async fn open_generation(&self, generation: &Generation) -> Result<(), Error>;

    /// Tags of every generation currently present in the store.
    async fn list_generations(&self) -> Result<Vec<String>, Error>;

    /// Delete a generation and all of its entries. Returns whether the
    /// generation existed.
    async fn delete_generation(&self, tag: &str) -> Result<bool, Error>;

    /// Look up a stored response.
    async fn get(&self, generation: &Generation, key: &CacheKey) -> Result<Option<CachedResponse>, Error>;

    /// Store a response, overwriting any previous entry for the key
    /// (last-write-wins).
    async fn put(&self, generation: &Generation, key: &CacheKey, response: &CachedResponse) -> Result<(), Error>;

    /// Total body bytes and entry count for a generation.
    async fn usage(&self, generation: &Generation) -> Result<CacheUsage, Error>;
}

#[async_trait]
impl CacheStore for SqliteStore {
    async fn open_generation(&self, generation: &Generation) -> Result<(), Error> {
        self.insert_generation(&generation.tag()).await
    }

    async fn list_generations(&self) -> Result<Vec<String>, Error> {
        self.generation_tags().await
    }

    async fn delete_generation(&self, tag: &str) -> Result<bool, Error> {
        self.remove_generation(tag).await
    }

    async fn get(&self, generation: &Generation, key: &CacheKey) -> Result<Option<CachedResponse>, Error> {
        self.get_entry(&generation.tag(), &key.digest()).await
    }

    async fn put(&self, generation: &Generation, key: &CacheKey, response: &CachedResponse) -> Result<(), Error> {
        self.put_entry(&generation.tag(), key, response).await
    }

    async fn usage(&self, generation: &Generation) -> Result<CacheUsage, Error> {
        self.generation_usage(&generation.tag()).await
    }
}
