//! Rate limiter: refilling budget, concurrency ceiling and dispatch spacing
//!
//! All three limits are global to one limiter instance, not per key.
//! - Budget: `remaining_tokens` refills to `capacity` every `refill_interval`;
//!   each dispatch spends one token, never refunded.
//! - Concurrency: at most `max_concurrent` permits are outstanding.
//! - Spacing: consecutive dispatches are at least `min_spacing` apart.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::debug;

use crate::ports::ProviderError;

/// Limiter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Tokens available per refill window
    pub capacity: u32,
    /// Refill window
    #[serde(with = "duration_ms")]
    pub refill_interval: Duration,
    /// Maximum in-flight operations
    pub max_concurrent: usize,
    /// Minimum gap between two dispatches
    #[serde(with = "duration_ms")]
    pub min_spacing: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            refill_interval: Duration::from_secs(1),
            max_concurrent: 5,
            min_spacing: Duration::from_millis(50),
        }
    }
}

/// Serde helper: durations as integer milliseconds
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[derive(Debug)]
struct BucketState {
    remaining: u32,
    window_start: Instant,
    last_dispatch: Option<Instant>,
}

/// RAII guard for one dispatched operation
#[derive(Debug)]
pub struct RateLimitPermit {
    _permit: OwnedSemaphorePermit,
}

/// Token-bucket limiter shared by every call to one provider
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    semaphore: Arc<Semaphore>,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        let config = RateLimiterConfig {
            capacity: config.capacity.max(1),
            max_concurrent: config.max_concurrent.max(1),
            ..config
        };

        Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            state: Mutex::new(BucketState {
                remaining: config.capacity,
                window_start: Instant::now(),
                last_dispatch: None,
            }),
            config,
        }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Wait for a concurrency slot, a budget token and the spacing gap.
    ///
    /// The returned permit holds the concurrency slot until dropped.
    pub async fn acquire(&self) -> Result<RateLimitPermit, ProviderError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|e| ProviderError::fatal(format!("rate limiter closed: {}", e)))?;

        let dispatch_at = loop {
            // Reserve token and slot in one uninterrupted step
            let wait_until = {
                let mut state = self.lock_state();
                let now = Instant::now();
                self.refill(&mut state, now);

                if state.remaining > 0 {
                    state.remaining -= 1;
                    let slot = match state.last_dispatch {
                        Some(last) => (last + self.config.min_spacing).max(now),
                        None => now,
                    };
                    state.last_dispatch = Some(slot);
                    break slot;
                }

                state.window_start + self.config.refill_interval
            };

            debug!(
                wait_ms = wait_until.saturating_duration_since(Instant::now()).as_millis() as u64,
                "Rate budget exhausted, waiting for refill"
            );
            tokio::time::sleep_until(wait_until).await;
        };

        tokio::time::sleep_until(dispatch_at).await;
        Ok(RateLimitPermit { _permit: permit })
    }

    /// Tokens left in the current window
    pub fn remaining_tokens(&self) -> u32 {
        let mut state = self.lock_state();
        self.refill(&mut state, Instant::now());
        state.remaining
    }

    /// Concurrency slots not currently held
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.window_start);
        if elapsed < self.config.refill_interval {
            return;
        }
        let interval = self.config.refill_interval.as_nanos().max(1);
        let windows = (elapsed.as_nanos() / interval) as u32;
        state.window_start += self.config.refill_interval.saturating_mul(windows);
        state.remaining = self.config.capacity;
    }

    fn lock_state(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(capacity: u32, refill_ms: u64, max_concurrent: usize, spacing_ms: u64) -> RateLimiterConfig {
        RateLimiterConfig {
            capacity,
            refill_interval: Duration::from_millis(refill_ms),
            max_concurrent,
            min_spacing: Duration::from_millis(spacing_ms),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_consumed_and_refilled() {
        let limiter = RateLimiter::new(config(3, 1000, 10, 0));
        let start = Instant::now();

        for _ in 0..3 {
            drop(limiter.acquire().await.unwrap());
        }
        assert_eq!(limiter.remaining_tokens(), 0);
        assert!(start.elapsed() < Duration::from_millis(1000));

        // Fourth dispatch waits for the next window
        drop(limiter.acquire().await.unwrap());
        assert!(start.elapsed() >= Duration::from_millis(1000));
        assert_eq!(limiter.remaining_tokens(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_spacing_between_dispatches() {
        let limiter = RateLimiter::new(config(100, 60_000, 10, 200));
        let mut stamps = Vec::new();

        for _ in 0..4 {
            let _permit = limiter.acquire().await.unwrap();
            stamps.push(Instant::now());
        }

        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(200));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_ceiling() {
        let limiter = Arc::new(RateLimiter::new(config(1000, 1000, 2, 0)));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let _permit = limiter.acquire().await.unwrap();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(limiter.available_slots(), 2);
    }

    #[test]
    fn test_config_from_toml_millis() {
        let parsed: RateLimiterConfig = toml::from_str(
            "capacity = 8\nrefill_interval = 1000\nmax_concurrent = 3\nmin_spacing = 120\n",
        )
        .unwrap();
        assert_eq!(parsed.refill_interval, Duration::from_secs(1));
        assert_eq!(parsed.min_spacing, Duration::from_millis(120));
    }

    #[test]
    fn test_zero_limits_are_clamped() {
        let limiter = RateLimiter::new(config(0, 1000, 0, 0));
        assert_eq!(limiter.config().capacity, 1);
        assert_eq!(limiter.available_slots(), 1);
    }
}
