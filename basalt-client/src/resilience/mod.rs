//! Request resilience: retry of transient failures and bounds on
//! concurrent outbound work.

pub mod concurrency;
pub mod config;
pub mod retry;

pub use concurrency::ConcurrencyLimiter;
pub use config::{ConcurrencyConfig, RetryConfig};
pub use retry::RetryPolicy;
