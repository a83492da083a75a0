//! The pluggable key-value store behind the cache middleware.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

/// A byte-oriented key-value store with per-entry expiry.
///
/// The middleware treats this as opaque shared state: it can be the
/// in-process default or an adapter over an external store shared across
/// processes. Implementations must replace values atomically; concurrent
/// readers may see the old or the new bytes but never a mix.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration);
    async fn delete(&self, key: &str);
}

/// The default process-local store.
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, (Vec<u8>, Option<Instant>)>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live entries, counting expired ones not yet collected.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((_, Some(expires_at))) if *expires_at <= Instant::now() => {
                entries.remove(key);
                None
            }
            Some((value, _)) => Some(value.clone()),
            None => None,
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let expires_at = Instant::now().checked_add(ttl);
        self.entries
            .lock()
            .await
            .insert(key.to_string(), (value, expires_at));
    }

    async fn delete(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryCacheStore::new();
        store
            .set("k", b"value".to_vec(), Duration::from_secs(60))
            .await;

        assert_eq!(store.get("k").await, Some(b"value".to_vec()));

        store.delete("k").await;
        assert_eq!(store.get("k").await, None);
    }

    #[tokio::test]
    async fn test_expired_entries_are_dropped_on_read() {
        let store = MemoryCacheStore::new();
        store.set("k", b"value".to_vec(), Duration::ZERO).await;

        assert_eq!(store.get("k").await, None);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_set_replaces_whole_value() {
        let store = MemoryCacheStore::new();
        store
            .set("k", b"first".to_vec(), Duration::from_secs(60))
            .await;
        store
            .set("k", b"second".to_vec(), Duration::from_secs(60))
            .await;

        assert_eq!(store.get("k").await, Some(b"second".to_vec()));
    }
}
