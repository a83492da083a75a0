//! In-place retry of transient transport failures.
//!
//! Only the closed set of transient classifications is retried: rate
//! limiting, service unavailability, and connection failures. Client errors
//! surface immediately. The back-off delay is sampled from a distribution
//! that widens with the attempt count, so concurrent callers spread out
//! instead of hammering the server in lockstep.

use std::time::Duration;

use log::warn;
use rand::Rng;
use tokio::time::Instant;

use super::config::RetryConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `op` until it succeeds, fails non-transiently, or the attempt
    /// budget is spent.
    ///
    /// A deadline, when given, spans the whole call: every attempt and every
    /// back-off sleep draws from the same budget rather than restarting it.
    /// Exhausting the attempt budget yields a typed error carrying the
    /// attempt count and the last failure.
    pub async fn execute<T, F, Fut>(
        &self,
        label: &str,
        deadline: Option<Duration>,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let limit = self.config.limit.max(1);

        for attempt in 1..=limit {
            let result = match deadline {
                Some(total) => {
                    let Some(remaining) = total.checked_sub(started.elapsed()) else {
                        return Err(Error::DeadlineExceeded {
                            attempts: attempt - 1,
                        });
                    };
                    match tokio::time::timeout(remaining, op()).await {
                        Ok(result) => result,
                        Err(_) => return Err(Error::DeadlineExceeded { attempts: attempt }),
                    }
                }
                None => op().await,
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    if attempt == limit {
                        return Err(Error::RetriesExhausted {
                            attempts: limit,
                            last: err.to_string(),
                        });
                    }
                    let delay = self.sample_backoff(attempt);
                    if let Some(total) = deadline {
                        if started.elapsed() + delay >= total {
                            return Err(Error::DeadlineExceeded { attempts: attempt });
                        }
                    }
                    warn!(
                        "{label}: attempt {attempt}/{limit} failed ({err}), retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }

        unreachable!("retry loop returns before running out of attempts")
    }

    /// Uniform sample over `(0, base_delay * attempt^2]`, capped at
    /// `max_delay`.
    fn sample_backoff(&self, attempt: u32) -> Duration {
        let ceiling = self.config.base_delay.as_millis() as u64 * u64::from(attempt).pow(2);
        if ceiling == 0 {
            return Duration::ZERO;
        }
        let sampled = rand::rng().random_range(1..=ceiling);
        Duration::from_millis(sampled).min(self.config.max_delay)
    }
}
