//! Request identity: URL canonicalization and cache-key digests.
//!
//! Concurrent requests for the same resource must land on the same store
//! key, so the URL is normalized before hashing:
//!
//! 1. Trim leading/trailing whitespace
//! 2. Default scheme to https:// if missing
//! 3. Lowercase the host
//! 4. Remove fragment (#...)
//! 5. Keep query string intact (do not reorder)

use sha2::{Digest, Sha256};

use crate::Error;

/// Normalized request identity: read-only method plus canonical URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    method: String,
    url: url::Url,
}

impl CacheKey {
    /// Build the key for a GET request to `url`.
    ///
    /// Only GET requests are ever cached; non-GET requests bypass the
    /// strategies entirely and never reach key construction.
    pub fn get(url: &str) -> Result<Self, Error> {
        Ok(Self { method: "GET".to_string(), url: canonicalize(url)? })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &url::Url {
        &self.url
    }

    /// SHA-256 digest of method + canonical URL, the store's primary key
    /// within a generation.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.url.as_str().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Canonicalize a URL string for consistent cache keys.
pub fn canonicalize(input: &str) -> Result<url::Url, Error> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(Error::InvalidUrl("empty URL".to_string()));
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = url::Url::parse(&url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(Error::InvalidUrl(format!("unsupported scheme: {scheme}"))),
    }

    if let Some(mut host) = parsed.host_str() {
        let h = host.to_lowercase();
        host = h.as_str();
        parsed
            .set_host(Some(host))
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}
