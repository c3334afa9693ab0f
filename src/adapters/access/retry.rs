//! Retry policy with capped exponential backoff and jitter

use std::time::Duration;

use rand::Rng;

/// Default retry budget for transient failures
pub const DEFAULT_MAX_RETRIES: u32 = 5;
/// Default backoff base
pub const DEFAULT_BASE_DELAY_MS: u64 = 500;
/// Default backoff ceiling
pub const DEFAULT_MAX_DELAY_MS: u64 = 60_000;
/// Jitter is drawn from `[0, max_jitter)`
pub const DEFAULT_MAX_JITTER_MS: u64 = 100;

/// Backoff parameters: `delay = min(max_delay, base * 2^attempt + jitter)`
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            max_jitter: Duration::from_millis(DEFAULT_MAX_JITTER_MS),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self { max_retries: 0, ..Self::default() }
    }

    /// Delay before retry number `attempt` (0-based) with a given jitter
    pub fn delay_for(&self, attempt: u32, jitter: Duration) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let exponential = self.base_delay.saturating_mul(factor);
        exponential.saturating_add(jitter).min(self.max_delay)
    }

    /// Delay before retry number `attempt` with random jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.delay_for(attempt, self.jitter())
    }

    fn jitter(&self) -> Duration {
        let max = self.max_jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(60));
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0, Duration::ZERO), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1, Duration::ZERO), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3, Duration::ZERO), Duration::from_millis(4000));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(10, Duration::ZERO), Duration::from_secs(60));
        assert_eq!(policy.delay_for(40, Duration::from_millis(99)), Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_non_decreasing_with_jitter() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let delays: Vec<Duration> = (0..12).map(|a| policy.backoff(a)).collect();
            for pair in delays.windows(2) {
                assert!(pair[1] >= pair[0], "{:?} then {:?}", pair[0], pair[1]);
            }
            assert!(delays.iter().all(|d| *d <= policy.max_delay));
        }
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..200 {
            let delay = policy.backoff(0);
            assert!(delay >= Duration::from_millis(500));
            assert!(delay < Duration::from_millis(600));
        }
    }
}
