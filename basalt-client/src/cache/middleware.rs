//! Caching middleware around the request pipeline.
//!
//! Successful idempotent responses are stored under a fingerprint of the
//! request; any mutating request against a collection eagerly deletes that
//! collection's stored entries before it is sent, trading hit rate for
//! staleness-avoidance. The cache is an optimization only: a racing read
//! and write on one key resolve last-writer-wins.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::store::CacheStore;
use crate::constants::MIN_CACHEABLE_BODY;
use crate::query::CachePolicy;

/// How long per-collection fingerprint indexes live. Entries referenced by
/// a dropped index simply age out on their own TTL.
const INDEX_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// The slice of an outbound request that participates in caching.
#[derive(Debug, Clone, Copy)]
pub struct CacheableRequest<'a> {
    /// Uppercase HTTP method.
    pub method: &'a str,
    /// Full request URL including the query string.
    pub url: &'a str,
    /// Request body for methods where it participates in identity.
    pub body: Option<&'a [u8]>,
    /// The collection this request touches, for invalidation.
    pub collection: Option<&'a str>,
    pub policy: CachePolicy,
}

/// A stored response: body, selected headers, and the status it carried.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

pub struct CacheMiddleware {
    store: Arc<dyn CacheStore>,
    default_ttl: Option<Duration>,
}

impl CacheMiddleware {
    pub fn new(store: Arc<dyn CacheStore>, default_ttl: Option<Duration>) -> Self {
        Self { store, default_ttl }
    }

    /// Deterministic cache key: method, normalized URL, and body.
    pub fn fingerprint(method: &str, url: &str, body: Option<&[u8]>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(method.as_bytes());
        hasher.update(b"\n");
        hasher.update(normalize_url(url).as_bytes());
        hasher.update(b"\n");
        if let Some(body) = body {
            hasher.update(body);
        }
        hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }

    /// Per-query TTL wins over the client default; an explicitly disabled
    /// policy means no read and no write.
    fn resolve_ttl(&self, policy: CachePolicy) -> Option<Duration> {
        match policy {
            CachePolicy::Disabled => None,
            CachePolicy::Ttl(ttl) => Some(ttl),
            CachePolicy::Default => self.default_ttl,
        }
    }

    /// Consult the cache before a request goes out.
    ///
    /// Mutating requests never hit the cache, but they do invalidate the
    /// touched collection's entries, since server state may be about to
    /// change under them.
    pub async fn before(&self, request: &CacheableRequest<'_>) -> Option<CachedResponse> {
        if request.method != "GET" {
            if let Some(collection) = request.collection {
                self.invalidate_collection(collection).await;
            }
            return None;
        }

        self.resolve_ttl(request.policy)?;
        let key = Self::fingerprint(request.method, request.url, request.body);
        let bytes = self.store.get(&key).await?;
        match serde_json::from_slice::<CachedResponse>(&bytes) {
            Ok(response) => {
                debug!("cache hit for {}", request.url);
                Some(response)
            }
            Err(_) => {
                // A corrupt entry is dropped rather than surfaced.
                self.store.delete(&key).await;
                None
            }
        }
    }

    /// Offer a completed response for storage.
    pub async fn after(
        &self,
        request: &CacheableRequest<'_>,
        status: u16,
        headers: &[(String, String)],
        body: &str,
    ) {
        if request.method != "GET" {
            return;
        }
        let Some(ttl) = self.resolve_ttl(request.policy) else {
            return;
        };
        // Absence responses and trivially small bodies are never stored.
        if status == 404 || status == 410 {
            return;
        }
        if status != 200 || body.len() < MIN_CACHEABLE_BODY {
            return;
        }

        let key = Self::fingerprint(request.method, request.url, request.body);
        let entry = CachedResponse {
            status,
            headers: headers.to_vec(),
            body: body.to_string(),
        };
        let Ok(bytes) = serde_json::to_vec(&entry) else {
            return;
        };
        self.store.set(&key, bytes, ttl).await;

        if let Some(collection) = request.collection {
            self.index_fingerprint(collection, &key).await;
        }
        debug!("cached {} for {:?}", request.url, ttl);
    }

    /// Drop every entry recorded against a collection.
    pub async fn invalidate_collection(&self, collection: &str) {
        let index_key = index_key(collection);
        let Some(bytes) = self.store.get(&index_key).await else {
            return;
        };
        if let Ok(fingerprints) = serde_json::from_slice::<Vec<String>>(&bytes) {
            debug!(
                "invalidating {} cached entries for collection {}",
                fingerprints.len(),
                collection
            );
            for fingerprint in &fingerprints {
                self.store.delete(fingerprint).await;
            }
        }
        self.store.delete(&index_key).await;
    }

    /// Record a fingerprint under its collection so mutations can find it.
    async fn index_fingerprint(&self, collection: &str, fingerprint: &str) {
        let index_key = index_key(collection);
        let mut fingerprints = match self.store.get(&index_key).await {
            Some(bytes) => serde_json::from_slice::<Vec<String>>(&bytes).unwrap_or_default(),
            None => Vec::new(),
        };
        if !fingerprints.iter().any(|existing| existing == fingerprint) {
            fingerprints.push(fingerprint.to_string());
        }
        if let Ok(bytes) = serde_json::to_vec(&fingerprints) {
            self.store.set(&index_key, bytes, INDEX_TTL).await;
        }
    }
}

fn index_key(collection: &str) -> String {
    format!("collection-index:{collection}")
}

/// Sort query pairs so parameter order never splits the cache.
fn normalize_url(url: &str) -> String {
    match url.split_once('?') {
        Some((base, query)) => {
            let mut pairs: Vec<&str> = query.split('&').collect();
            pairs.sort_unstable();
            format!("{base}?{}", pairs.join("&"))
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryCacheStore;

    const BODY: &str = r#"{"results":[{"objectId":"xKq9mT2pWc"}]}"#;

    fn middleware(default_ttl: Option<Duration>) -> CacheMiddleware {
        CacheMiddleware::new(Arc::new(MemoryCacheStore::new()), default_ttl)
    }

    fn get_request<'a>(url: &'a str, policy: CachePolicy) -> CacheableRequest<'a> {
        CacheableRequest {
            method: "GET",
            url,
            body: None,
            collection: Some("Song"),
            policy,
        }
    }

    #[test]
    fn test_fingerprint_normalizes_query_order() {
        let a = CacheMiddleware::fingerprint("GET", "https://x/1/classes/Song?a=1&b=2", None);
        let b = CacheMiddleware::fingerprint("GET", "https://x/1/classes/Song?b=2&a=1", None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_varies_by_method_url_and_body() {
        let base = CacheMiddleware::fingerprint("GET", "https://x/1/classes/Song", None);
        assert_ne!(
            base,
            CacheMiddleware::fingerprint("POST", "https://x/1/classes/Song", None)
        );
        assert_ne!(
            base,
            CacheMiddleware::fingerprint("GET", "https://x/1/classes/Album", None)
        );
        assert_ne!(
            base,
            CacheMiddleware::fingerprint("GET", "https://x/1/classes/Song", Some(b"{}"))
        );
    }

    #[tokio::test]
    async fn test_store_and_hit() {
        let cache = middleware(Some(Duration::from_secs(60)));
        let request = get_request("https://x/1/classes/Song", CachePolicy::Default);

        assert!(cache.before(&request).await.is_none());
        cache.after(&request, 200, &[], BODY).await;

        let hit = cache.before(&request).await.unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.body, BODY);
    }

    #[tokio::test]
    async fn test_short_bodies_and_absence_statuses_are_not_stored() {
        let cache = middleware(Some(Duration::from_secs(60)));
        let request = get_request("https://x/1/classes/Song", CachePolicy::Default);

        cache.after(&request, 200, &[], "{}").await;
        assert!(cache.before(&request).await.is_none());

        cache.after(&request, 404, &[], BODY).await;
        assert!(cache.before(&request).await.is_none());

        cache.after(&request, 410, &[], BODY).await;
        assert!(cache.before(&request).await.is_none());
    }

    #[tokio::test]
    async fn test_mutation_invalidates_collection() {
        let cache = middleware(Some(Duration::from_secs(60)));
        let read = get_request("https://x/1/classes/Song", CachePolicy::Default);

        cache.after(&read, 200, &[], BODY).await;
        assert!(cache.before(&read).await.is_some());

        let write = CacheableRequest {
            method: "POST",
            url: "https://x/1/classes/Song",
            body: Some(b"{\"name\":\"A\"}"),
            collection: Some("Song"),
            policy: CachePolicy::Default,
        };
        assert!(cache.before(&write).await.is_none());

        assert!(cache.before(&read).await.is_none());
    }

    #[tokio::test]
    async fn test_mutation_leaves_other_collections_alone() {
        let cache = middleware(Some(Duration::from_secs(60)));
        let songs = get_request("https://x/1/classes/Song", CachePolicy::Default);
        let albums = CacheableRequest {
            collection: Some("Album"),
            ..get_request("https://x/1/classes/Album", CachePolicy::Default)
        };

        cache.after(&songs, 200, &[], BODY).await;
        cache.after(&albums, 200, &[], BODY).await;

        let write = CacheableRequest {
            method: "DELETE",
            url: "https://x/1/classes/Song/xKq9mT2pWc",
            body: None,
            collection: Some("Song"),
            policy: CachePolicy::Default,
        };
        assert!(cache.before(&write).await.is_none());

        assert!(cache.before(&songs).await.is_none());
        assert!(cache.before(&albums).await.is_some());
    }

    #[tokio::test]
    async fn test_disabled_policy_skips_read_and_write() {
        let cache = middleware(Some(Duration::from_secs(60)));
        let cached = get_request("https://x/1/classes/Song", CachePolicy::Default);
        let disabled = get_request("https://x/1/classes/Song", CachePolicy::Disabled);

        cache.after(&cached, 200, &[], BODY).await;
        assert!(cache.before(&disabled).await.is_none());

        cache.after(&disabled, 200, &[], BODY).await;
    }

    #[tokio::test]
    async fn test_query_ttl_enables_caching_without_client_default() {
        let cache = middleware(None);
        let plain = get_request("https://x/1/classes/Song", CachePolicy::Default);
        let with_ttl = get_request(
            "https://x/1/classes/Song",
            CachePolicy::Ttl(Duration::from_secs(30)),
        );

        // No client default: plain queries are not cached.
        cache.after(&plain, 200, &[], BODY).await;
        assert!(cache.before(&plain).await.is_none());

        // An explicit per-query TTL turns caching on for that query.
        cache.after(&with_ttl, 200, &[], BODY).await;
        assert!(cache.before(&with_ttl).await.is_some());
    }
}
