//! Agent lifecycle: install, activate, and the message/sync/push hooks.
//!
//! One handler method per environment event kind. Install pre-populates a
//! candidate generation atomically; activate deletes every other generation
//! and takes over open clients; the remaining hooks answer page messages and
//! render push notifications.

use std::sync::Arc;

use offshore_client::Fetcher;
use offshore_core::store::{CacheKey, CacheStore, CachedResponse, Generation};
use offshore_core::{AppConfig, Error, format_bytes};
use tracing::{error, info, warn};
use url::Url;

use crate::classify::{Classifier, RequestClass};
use crate::protocol::{CacheSizeInfo, Message, MessageReply, PushPayload};
use crate::strategy::StrategyEngine;

/// Result of a fetch event: a response from a strategy, or a deliberate
/// hand-off to the environment's default handling.
#[derive(Debug)]
pub enum FetchOutcome {
    Handled(CachedResponse),
    Passthrough,
}

/// Install succeeded: the candidate generation is populated and the agent
/// wants to take effect without waiting for existing clients to release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub generation: String,
    pub cached: usize,
    pub skip_waiting: bool,
}

/// Activation finished: stale generations removed, clients claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateReport {
    pub active: String,
    pub deleted: Vec<String>,
    pub claimed: bool,
}

/// A user-visible notification built from a push payload. Fixed icon, badge,
/// and tag; requires explicit dismissal.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub require_interaction: bool,
}

/// What the environment should do when the user activates a notification.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientAction {
    OpenWindow { url: String },
}

/// The offline-caching agent: classifier, strategy engine, and lifecycle
/// state over one configured generation.
pub struct CacheAgent<S, F> {
    config: AppConfig,
    classifier: Classifier,
    engine: StrategyEngine<S, F>,
    store: Arc<S>,
    fetcher: Arc<F>,
    generation: Generation,
}

impl<S, F> CacheAgent<S, F>
where
    S: CacheStore + 'static,
    F: Fetcher + 'static,
{
    pub fn new(config: AppConfig, store: Arc<S>, fetcher: Arc<F>) -> Result<Self, Error> {
        let classifier = Classifier::from_config(&config)?;
        let generation = config.generation();
        let origin = Url::parse(&config.origin)
            .map_err(|e| Error::InvalidUrl(format!("origin {}: {e}", config.origin)))?;
        let fallback_url = config.resolve(&config.offline_fallback)?;
        let offline_fallback = CacheKey::get(fallback_url.as_str())?;

        let engine = StrategyEngine::new(
            Arc::clone(&store),
            Arc::clone(&fetcher),
            generation.clone(),
            origin,
            offline_fallback,
        );

        Ok(Self { config, classifier, engine, store, fetcher, generation })
    }

    pub fn generation(&self) -> &Generation {
        &self.generation
    }

    /// Install: populate the candidate generation with the full manifest.
    ///
    /// All-or-nothing: any resolve, fetch, or store failure discards the
    /// candidate generation and aborts the install. A manifest fetch must
    /// come back 200 to count.
    pub async fn on_install(&self) -> Result<InstallReport, Error> {
        info!(generation = %self.generation, "installing");
        self.store.open_generation(&self.generation).await?;

        let mut cached = 0usize;
        for entry in &self.config.manifest {
            match self.install_entry(entry).await {
                Ok(()) => cached += 1,
                Err(err) => {
                    error!(entry = %entry, error = %err, "caching failed, aborting install");
                    self.discard_candidate().await;
                    return Err(Error::InstallAborted(format!("{entry}: {err}")));
                }
            }
        }

        info!(generation = %self.generation, cached, "core files cached, skipping waiting");
        Ok(InstallReport { generation: self.generation.tag(), cached, skip_waiting: true })
    }

    async fn install_entry(&self, entry: &str) -> Result<(), Error> {
        let url = self.config.resolve(entry)?;
        let key = CacheKey::get(url.as_str())?;
        let response = self.fetcher.fetch(key.url()).await?;
        if !response.is_ok() {
            return Err(Error::FetchFailed(format!("status {}", response.status)));
        }
        self.store.put(&self.generation, &key, &response.into_cached()).await
    }

    async fn discard_candidate(&self) {
        if let Err(err) = self.store.delete_generation(&self.generation.tag()).await {
            // The generation survives with partial contents; the next
            // activation of a newer generation deletes it.
            warn!(generation = %self.generation, error = %err, "failed to discard candidate generation");
        }
    }

    /// Activate: delete every generation other than the active one, then
    /// claim all open clients immediately.
    pub async fn on_activate(&self) -> Result<ActivateReport, Error> {
        info!(generation = %self.generation, "activating");

        let active = self.generation.tag();
        let mut deleted = Vec::new();
        for tag in self.store.list_generations().await? {
            if tag != active {
                self.store.delete_generation(&tag).await?;
                info!(stale = %tag, "deleted old cache generation");
                deleted.push(tag);
            }
        }

        info!(generation = %self.generation, "activated and claimed clients");
        Ok(ActivateReport { active, deleted, claimed: true })
    }

    /// Fetch: classify and dispatch to a strategy. Non-GET requests bypass
    /// every strategy and fall through to the environment's default.
    pub async fn on_fetch(&self, method: &str, url: &str) -> Result<FetchOutcome, Error> {
        if !method.eq_ignore_ascii_case("GET") {
            return Ok(FetchOutcome::Passthrough);
        }

        let key = CacheKey::get(url)?;
        let response = match self.classifier.classify(url) {
            RequestClass::CoreFile => self.engine.cache_first(&key).await?,
            RequestClass::Tile => self.engine.stale_while_revalidate(&key).await?,
            RequestClass::Other => self.engine.network_first(&key).await?,
        };

        Ok(FetchOutcome::Handled(response))
    }

    /// Message: answer a size query over the active generation.
    pub async fn on_message(&self, message: Message) -> Result<MessageReply, Error> {
        match message {
            Message::CacheSize => {
                let usage = self.store.usage(&self.generation).await?;
                Ok(MessageReply::CacheSizeResponse {
                    size: CacheSizeInfo {
                        raw: usage.raw,
                        count: usage.count,
                        formatted: format_bytes(usage.raw),
                    },
                })
            }
        }
    }

    /// Background sync hook. No queued-offline-action replay exists yet.
    pub async fn on_sync(&self, tag: &str) -> Result<(), Error> {
        if tag == "background-sync" {
            info!("background sync triggered");
        }
        Ok(())
    }

    /// Push: render a notification from a JSON payload. Events without a
    /// payload are ignored; malformed payloads are an error.
    pub fn on_push(&self, payload: Option<&serde_json::Value>) -> Result<Option<Notification>, Error> {
        let Some(payload) = payload else {
            return Ok(None);
        };

        let data: PushPayload =
            serde_json::from_value(payload.clone()).map_err(|e| Error::InvalidPayload(e.to_string()))?;

        Ok(Some(Notification {
            title: data.title,
            body: data.body,
            icon: "/icons/icon-192.png".to_string(),
            badge: "/icons/badge-72.png".to_string(),
            tag: "navigation-warning".to_string(),
            require_interaction: true,
        }))
    }

    /// Notification click: close it and open or focus the application root.
    pub fn on_notification_click(&self) -> ClientAction {
        ClientAction::OpenWindow { url: "/".to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockFetcher;
    use offshore_core::SqliteStore;

    async fn agent(config: AppConfig, fetcher: MockFetcher) -> CacheAgent<SqliteStore, MockFetcher> {
        let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
        CacheAgent::new(config, store, Arc::new(fetcher)).unwrap()
    }

    fn test_config() -> AppConfig {
        AppConfig {
            origin: "https://app.test".into(),
            manifest: vec!["/".into(), "/index.html".into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_install_populates_generation() {
        let fetcher = MockFetcher::new();
        fetcher.respond("https://app.test/", 200, b"root");
        fetcher.respond("https://app.test/index.html", 200, b"<html></html>");
        let agent = agent(test_config(), fetcher).await;

        let report = agent.on_install().await.unwrap();
        assert_eq!(report.cached, 2);
        assert_eq!(report.generation, "offshore-v1.0");
        assert!(report.skip_waiting);

        let key = CacheKey::get("https://app.test/index.html").unwrap();
        let stored = agent.store.get(agent.generation(), &key).await.unwrap().unwrap();
        assert_eq!(stored.body, b"<html></html>");
    }

    #[tokio::test]
    async fn test_install_aborts_on_single_failure() {
        let config = AppConfig {
            origin: "https://app.test".into(),
            manifest: vec!["/a".into(), "/b".into()],
            ..Default::default()
        };
        let fetcher = MockFetcher::new();
        fetcher.respond("https://app.test/a", 200, b"a");
        fetcher.fail("https://app.test/b", "unreachable");
        let agent = agent(config, fetcher).await;

        let result = agent.on_install().await;
        assert!(matches!(result, Err(Error::InstallAborted(_))));

        // The candidate generation is discarded wholesale.
        assert!(agent.store.list_generations().await.unwrap().is_empty());
        let key = CacheKey::get("https://app.test/a").unwrap();
        assert!(agent.store.get(agent.generation(), &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_install_rejects_non_200_manifest_fetch() {
        let config = AppConfig {
            origin: "https://app.test".into(),
            manifest: vec!["/a".into()],
            ..Default::default()
        };
        let fetcher = MockFetcher::new();
        fetcher.respond("https://app.test/a", 404, b"missing");
        let agent = agent(config, fetcher).await;

        assert!(matches!(agent.on_install().await, Err(Error::InstallAborted(_))));
    }

    #[tokio::test]
    async fn test_activate_deletes_stale_generations() {
        let agent = agent(test_config(), MockFetcher::new()).await;
        agent.store.open_generation(&Generation::new("offshore", "0.8")).await.unwrap();
        agent.store.open_generation(&Generation::new("offshore", "0.9")).await.unwrap();
        agent.store.open_generation(agent.generation()).await.unwrap();

        let report = agent.on_activate().await.unwrap();
        assert_eq!(report.active, "offshore-v1.0");
        assert_eq!(report.deleted.len(), 2);
        assert!(report.claimed);

        let remaining = agent.store.list_generations().await.unwrap();
        assert_eq!(remaining, vec!["offshore-v1.0".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_install_leaves_nothing_to_activate() {
        let config = AppConfig {
            origin: "https://app.test".into(),
            manifest: vec!["/a".into(), "/b".into()],
            ..Default::default()
        };
        let fetcher = MockFetcher::new();
        fetcher.respond("https://app.test/a", 200, b"a");
        fetcher.fail("https://app.test/b", "unreachable");
        let agent = agent(config, fetcher).await;

        assert!(agent.on_install().await.is_err());

        let report = agent.on_activate().await.unwrap();
        assert!(report.deleted.is_empty());
        assert!(agent.store.list_generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_non_get_passes_through() {
        let agent = agent(test_config(), MockFetcher::new()).await;
        let outcome = agent.on_fetch("POST", "https://app.test/waypoints").await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Passthrough));
    }

    #[tokio::test]
    async fn test_fetch_routes_core_file_to_cache_first() {
        let agent = agent(test_config(), MockFetcher::new()).await;
        let key = CacheKey::get("https://app.test/index.html").unwrap();
        let seeded = CachedResponse::new(200, None, Vec::new(), b"cached".to_vec());
        agent.store.put(agent.generation(), &key, &seeded).await.unwrap();

        let outcome = agent.on_fetch("GET", "https://app.test/index.html").await.unwrap();
        match outcome {
            FetchOutcome::Handled(response) => assert_eq!(response.body, b"cached"),
            FetchOutcome::Passthrough => panic!("core file must be handled"),
        }
        assert_eq!(agent.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_size_message() {
        let agent = agent(test_config(), MockFetcher::new()).await;
        let key = CacheKey::get("https://app.test/data.geojson").unwrap();
        let seeded = CachedResponse::new(200, None, Vec::new(), vec![0u8; 1536]);
        agent.store.put(agent.generation(), &key, &seeded).await.unwrap();

        let reply = agent.on_message(Message::CacheSize).await.unwrap();
        let MessageReply::CacheSizeResponse { size } = reply;
        assert_eq!(size, CacheSizeInfo { raw: 1536, count: 1, formatted: "1.50 KB".to_string() });
    }

    #[tokio::test]
    async fn test_cache_size_empty_generation() {
        let agent = agent(test_config(), MockFetcher::new()).await;
        let reply = agent.on_message(Message::CacheSize).await.unwrap();
        let MessageReply::CacheSizeResponse { size } = reply;
        assert_eq!(size, CacheSizeInfo { raw: 0, count: 0, formatted: "0 Bytes".to_string() });
    }

    #[tokio::test]
    async fn test_sync_stub_is_ok() {
        let agent = agent(test_config(), MockFetcher::new()).await;
        agent.on_sync("background-sync").await.unwrap();
        agent.on_sync("unrelated-tag").await.unwrap();
    }

    #[tokio::test]
    async fn test_push_builds_notification() {
        let agent = agent(test_config(), MockFetcher::new()).await;
        let payload = serde_json::json!({"title": "Storm warning", "body": "Seek shelter"});

        let notification = agent.on_push(Some(&payload)).unwrap().unwrap();
        assert_eq!(notification.title, "Storm warning");
        assert_eq!(notification.body, "Seek shelter");
        assert_eq!(notification.icon, "/icons/icon-192.png");
        assert_eq!(notification.badge, "/icons/badge-72.png");
        assert_eq!(notification.tag, "navigation-warning");
        assert!(notification.require_interaction);
    }

    #[tokio::test]
    async fn test_push_without_payload_ignored() {
        let agent = agent(test_config(), MockFetcher::new()).await;
        assert!(agent.on_push(None).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_push_malformed_payload_rejected() {
        let agent = agent(test_config(), MockFetcher::new()).await;
        let payload = serde_json::json!({"title": 42});
        assert!(matches!(agent.on_push(Some(&payload)), Err(Error::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn test_notification_click_opens_root() {
        let agent = agent(test_config(), MockFetcher::new()).await;
        assert_eq!(agent.on_notification_click(), ClientAction::OpenWindow { url: "/".to_string() });
    }
}
