//! Resilience configuration with preset profiles.

use std::time::Duration;

/// Retry behavior for transient transport failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts per logical request, the first one included.
    pub limit: u32,
    /// Scale of the sampled back-off delay.
    pub base_delay: Duration,
    /// Hard ceiling on any single back-off delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            limit: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Fewer attempts, longer waits. For production traffic sharing a rate
    /// budget with other clients.
    pub fn conservative() -> Self {
        Self {
            limit: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }

    /// More attempts, shorter waits. For development and migrations.
    pub fn aggressive() -> Self {
        Self {
            limit: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
        }
    }

    /// A single attempt and no waiting.
    pub fn disabled() -> Self {
        Self {
            limit: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

/// Bounds on concurrent outbound work.
#[derive(Debug, Clone)]
pub struct ConcurrencyConfig {
    /// Maximum in-flight HTTP requests across the client.
    pub max_concurrent_requests: usize,
    /// Maximum batch chunks executing at once.
    pub max_concurrent_chunks: usize,
    /// Whether limiting is enforced at all.
    pub enabled: bool,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 20,
            max_concurrent_chunks: 8,
            enabled: true,
        }
    }
}

impl ConcurrencyConfig {
    /// No limiting, for tests and single-request tools.
    pub fn disabled() -> Self {
        Self {
            max_concurrent_requests: usize::MAX,
            max_concurrent_chunks: usize::MAX,
            enabled: false,
        }
    }
}
