//! Semaphore-based bound on concurrent outbound requests.
//!
//! Batch execution fans chunks out across tasks; the limiter keeps the
//! total number of in-flight requests inside the configured bound so a
//! large batch cannot starve interactive queries or trip the server's
//! connection ceiling.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::config::ConcurrencyConfig;

/// Permit pool standing in for "unlimited" when limiting is disabled.
const UNLIMITED_PERMITS: usize = 1_000_000;

#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    config: ConcurrencyConfig,
    waited: Arc<AtomicU64>,
}

impl ConcurrencyLimiter {
    pub fn new(config: ConcurrencyConfig) -> Self {
        let permits = if config.enabled {
            config.max_concurrent_requests.min(UNLIMITED_PERMITS)
        } else {
            UNLIMITED_PERMITS
        };

        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            config,
            waited: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Acquire a permit, waiting when the pool is at capacity. The permit
    /// releases on drop.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        if self.config.enabled && self.semaphore.available_permits() == 0 {
            self.waited.fetch_add(1, Ordering::Relaxed);
            debug!(
                "request waiting for permit ({} in flight)",
                self.config.max_concurrent_requests
            );
        }

        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("limiter semaphore is never closed")
    }

    /// Acquire without waiting; `None` when the pool is exhausted.
    pub fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.semaphore.clone().try_acquire_owned().ok()
    }

    pub fn available_permits(&self) -> usize {
        if !self.config.enabled {
            return usize::MAX;
        }
        self.semaphore.available_permits()
    }

    /// How many batch chunks may execute at once.
    pub fn max_concurrent_chunks(&self) -> usize {
        self.config.max_concurrent_chunks.max(1)
    }

    /// How often callers had to wait for a permit since construction.
    pub fn wait_count(&self) -> u64 {
        self.waited.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_limiter_never_blocks() {
        let limiter = ConcurrencyLimiter::new(ConcurrencyConfig::disabled());

        let mut permits = Vec::new();
        for _ in 0..100 {
            permits.push(limiter.try_acquire().unwrap());
        }
        assert_eq!(permits.len(), 100);
    }

    #[tokio::test]
    async fn test_pool_caps_in_flight_requests() {
        let limiter = ConcurrencyLimiter::new(ConcurrencyConfig {
            max_concurrent_requests: 2,
            max_concurrent_chunks: 1,
            enabled: true,
        });

        let _one = limiter.try_acquire().unwrap();
        let two = limiter.try_acquire().unwrap();
        assert!(limiter.try_acquire().is_none());

        drop(two);
        assert!(limiter.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_acquire_waits_for_release() {
        let limiter = ConcurrencyLimiter::new(ConcurrencyConfig {
            max_concurrent_requests: 1,
            max_concurrent_chunks: 1,
            enabled: true,
        });

        let held = limiter.acquire().await;
        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                let _permit = limiter.acquire().await;
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(held);
        tokio::time::timeout(std::time::Duration::from_millis(100), waiter)
            .await
            .expect("waiter should finish once the permit frees")
            .unwrap();
        assert!(limiter.wait_count() >= 1);
    }

    #[test]
    fn test_chunk_bound_is_at_least_one() {
        let limiter = ConcurrencyLimiter::new(ConcurrencyConfig {
            max_concurrent_requests: 4,
            max_concurrent_chunks: 0,
            enabled: true,
        });
        assert_eq!(limiter.max_concurrent_chunks(), 1);
    }
}
