//! The three request-handling strategies.
//!
//! Core files load instantly offline (cache-first with an offline fallback),
//! dynamic content reflects live state when reachable (network-first), and
//! tiles tolerate staleness but self-heal when online (stale-while-
//! revalidate). Store writes are best-effort everywhere here: a failed write
//! is logged and swallowed, never surfaced to the caller.

use std::sync::Arc;

use offshore_client::Fetcher;
use offshore_core::store::{CacheKey, CacheStore, CachedResponse, Generation};
use offshore_core::Error;
use tracing::{debug, warn};
use url::Url;

/// Runs the strategies over one store generation and one fetcher.
pub struct StrategyEngine<S, F> {
    store: Arc<S>,
    fetcher: Arc<F>,
    generation: Generation,
    origin: Url,
    offline_fallback: CacheKey,
}

impl<S, F> StrategyEngine<S, F>
where
    S: CacheStore + 'static,
    F: Fetcher + 'static,
{
    pub fn new(store: Arc<S>, fetcher: Arc<F>, generation: Generation, origin: Url, offline_fallback: CacheKey) -> Self {
        Self { store, fetcher, generation, origin, offline_fallback }
    }

    /// Cache-first, for core application files.
    ///
    /// Store hit answers without touching the network. On a miss, a 200
    /// same-origin response is stored and returned; anything else routes
    /// through the offline fallback.
    pub async fn cache_first(&self, key: &CacheKey) -> Result<CachedResponse, Error> {
        if let Some(hit) = self.store.get(&self.generation, key).await? {
            debug!(url = %key.url(), "cache hit");
            return Ok(hit);
        }

        debug!(url = %key.url(), "cache miss, fetching");
        match self.fetcher.fetch(key.url()).await {
            Ok(response) if response.is_ok() && response.is_basic(&self.origin) => {
                let cached = response.into_cached();
                if let Err(e) = self.store.put(&self.generation, key, &cached).await {
                    warn!(url = %key.url(), error = %e, "cache write failed");
                }
                Ok(cached)
            }
            Ok(response) => {
                // Not cacheable: serve the offline fallback when it exists,
                // otherwise hand the response through unchanged.
                debug!(url = %key.url(), status = response.status, "response not cacheable");
                match self.store.get(&self.generation, &self.offline_fallback).await? {
                    Some(fallback) => Ok(fallback),
                    None => Ok(response.into_cached()),
                }
            }
            Err(err) => {
                warn!(url = %key.url(), error = %err, "fetch failed");
                match self.store.get(&self.generation, &self.offline_fallback).await? {
                    Some(fallback) => Ok(fallback),
                    None => Err(err),
                }
            }
        }
    }

    /// Network-first, for dynamic and unclassified content.
    ///
    /// A 200 response refreshes the store on the way out. Network failure
    /// falls back to the stored entry; without one the original error
    /// propagates.
    pub async fn network_first(&self, key: &CacheKey) -> Result<CachedResponse, Error> {
        match self.fetcher.fetch(key.url()).await {
            Ok(response) if response.is_ok() => {
                let cached = response.into_cached();
                if let Err(e) = self.store.put(&self.generation, key, &cached).await {
                    warn!(url = %key.url(), error = %e, "cache write failed");
                }
                Ok(cached)
            }
            Ok(response) => Ok(response.into_cached()),
            Err(err) => {
                debug!(url = %key.url(), "network failed, trying cache");
                match self.store.get(&self.generation, key).await {
                    Ok(Some(hit)) => Ok(hit),
                    Ok(None) => Err(err),
                    Err(store_err) => {
                        warn!(url = %key.url(), error = %store_err, "cache lookup failed");
                        Err(err)
                    }
                }
            }
        }
    }

    /// Stale-while-revalidate, for map tiles.
    ///
    /// The revalidation fetch starts unconditionally and writes any 200
    /// result back to the store. A store hit answers immediately while the
    /// fetch continues in the background; on a miss the caller gets the
    /// network result, or a structured offline error when both sides miss.
    pub async fn stale_while_revalidate(&self, key: &CacheKey) -> Result<CachedResponse, Error> {
        let revalidate = {
            let store = Arc::clone(&self.store);
            let fetcher = Arc::clone(&self.fetcher);
            let generation = self.generation.clone();
            let key = key.clone();
            tokio::spawn(async move {
                match fetcher.fetch(key.url()).await {
                    Ok(response) if response.is_ok() => {
                        let cached = response.into_cached();
                        if let Err(e) = store.put(&generation, &key, &cached).await {
                            warn!(url = %key.url(), error = %e, "revalidation write failed");
                        }
                        Some(cached)
                    }
                    Ok(response) => Some(response.into_cached()),
                    Err(err) => {
                        debug!(url = %key.url(), error = %err, "tile fetch failed");
                        None
                    }
                }
            })
        };

        if let Some(hit) = self.store.get(&self.generation, key).await? {
            debug!(url = %key.url(), "serving stale tile, revalidating in background");
            return Ok(hit);
        }

        match revalidate
            .await
            .map_err(|e| Error::FetchFailed(format!("revalidation task failed: {e}")))?
        {
            Some(response) => Ok(response),
            None => Err(Error::Offline(key.url().to_string())),
        }
    }
}
