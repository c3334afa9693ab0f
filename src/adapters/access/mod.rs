//! Rate-Limited Provider Access
//!
//! Every provider call goes through `RateLimitedAccess::schedule`, which:
//! - picks an endpoint at random from the pool,
//! - waits for the limiter (budget, concurrency, spacing),
//! - retries transient failures with capped exponential backoff plus jitter.
//!
//! Fatal errors and exhausted retries propagate as typed failures. This layer
//! never substitutes empty data; fallbacks belong to the provider clients.

mod endpoints;
mod http;
mod rate_limiter;
mod retry;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

pub use endpoints::{EndpointPool, ProviderEndpoint};
pub use http::fetch_json;
pub(crate) use rate_limiter::duration_ms;
pub use rate_limiter::{RateLimitPermit, RateLimiter, RateLimiterConfig};
pub use retry::RetryPolicy;

use crate::ports::ProviderError;

/// Counters for one access instance
#[derive(Debug, Default)]
struct AccessCounters {
    dispatched: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of the access counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessStats {
    /// Attempts that reached the provider (including retries)
    pub dispatched: u64,
    /// Attempts followed by a backoff and another attempt
    pub retried: u64,
    /// Operations that ended in an error
    pub failed: u64,
}

/// Rate-limited, retrying gateway to one provider
#[derive(Debug)]
pub struct RateLimitedAccess {
    name: String,
    endpoints: EndpointPool,
    limiter: RateLimiter,
    retry: RetryPolicy,
    counters: AccessCounters,
}

impl RateLimitedAccess {
    pub fn new(
        name: impl Into<String>,
        endpoints: EndpointPool,
        limiter: RateLimiterConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            endpoints,
            limiter: RateLimiter::new(limiter),
            retry,
            counters: AccessCounters::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoints(&self) -> &EndpointPool {
        &self.endpoints
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn stats(&self) -> AccessStats {
        AccessStats {
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            retried: self.counters.retried.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Run an idempotent read against one of the pool's endpoints.
    ///
    /// `operation` is invoked once per attempt with the endpoint picked for
    /// that attempt. The concurrency slot is held only while the attempt runs,
    /// never during backoff.
    pub async fn schedule<T, F, Fut>(&self, operation: F) -> Result<T, ProviderError>
    where
        F: Fn(ProviderEndpoint) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            let endpoint = self.endpoints.pick().clone();

            let result = {
                let _permit = self.limiter.acquire().await?;
                self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
                debug!(provider = %self.name, endpoint = %endpoint.url, attempt, "Dispatching");
                operation(endpoint.clone()).await
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                debug!(provider = %self.name, error = %err, "Fatal provider error");
                return Err(err);
            }

            if attempt >= self.retry.max_retries {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    provider = %self.name,
                    attempts = attempt + 1,
                    error = %err,
                    "Retry budget exhausted"
                );
                return Err(ProviderError::RetriesExhausted {
                    attempts: attempt + 1,
                    last: Box::new(err),
                });
            }

            let delay = self.retry.backoff(attempt);
            self.counters.retried.fetch_add(1, Ordering::Relaxed);
            warn!(
                provider = %self.name,
                endpoint = %endpoint.url,
                error = %err,
                "Transient failure, backing off for {:?} (attempt {}/{})",
                delay,
                attempt + 1,
                self.retry.max_retries
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
