//! Test doubles shared across strategy and lifecycle tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use offshore_client::{FetchedResponse, Fetcher};
use offshore_core::Error;
use offshore_core::store::key::canonicalize;
use url::Url;

enum Route {
    Respond { status: u16, body: Vec<u8>, final_url: Option<String> },
    Fail(String),
}

/// Scripted fetcher: canned responses per URL, a call counter, and an
/// optional artificial delay for observing stale-while-revalidate timing.
/// URLs without a route fail like an unreachable host.
pub struct MockFetcher {
    routes: Mutex<HashMap<String, Route>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self { routes: Mutex::new(HashMap::new()), calls: AtomicUsize::new(0), delay: None }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond(&self, url: &str, status: u16, body: &[u8]) {
        self.insert(url, Route::Respond { status, body: body.to_vec(), final_url: None });
    }

    /// Respond as if the request was redirected to `final_url`.
    pub fn respond_redirected(&self, url: &str, final_url: &str, status: u16, body: &[u8]) {
        self.insert(url, Route::Respond { status, body: body.to_vec(), final_url: Some(final_url.to_string()) });
    }

    pub fn fail(&self, url: &str, reason: &str) {
        self.insert(url, Route::Fail(reason.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn insert(&self, url: &str, route: Route) {
        let canonical = canonicalize(url).unwrap().to_string();
        self.routes.lock().unwrap().insert(canonical, route);
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedResponse, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let routes = self.routes.lock().unwrap();
        match routes.get(url.as_str()) {
            Some(Route::Respond { status, body, final_url }) => {
                let final_url = match final_url {
                    Some(f) => Url::parse(f).unwrap(),
                    None => url.clone(),
                };
                Ok(FetchedResponse {
                    url: url.clone(),
                    final_url,
                    status: *status,
                    content_type: None,
                    body: Bytes::from(body.clone()),
                    headers: Vec::new(),
                    fetch_ms: 0,
                })
            }
            Some(Route::Fail(reason)) => Err(Error::FetchFailed(reason.clone())),
            None => Err(Error::FetchFailed(format!("no route for {url}"))),
        }
    }
}
