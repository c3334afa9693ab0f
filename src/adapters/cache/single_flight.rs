//! Single-Flight TTL Cache
//!
//! Wraps a logical fetch with a time-to-live cache and in-flight
//! de-duplication: concurrent callers asking for the same key share one
//! upstream call and all receive its result.
//!
//! Entries are stored as JSON values and decoded on read. A stored payload
//! that no longer decodes as the requested type is purged and refetched.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::ports::ProviderError;

/// Default bound on one fetch, including every waiter
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);
/// Default max cache entries
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

type SharedFetch = Shared<BoxFuture<'static, Result<Value, ProviderError>>>;

/// Cache entry with TTL tracking
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(value: Value, ttl: Duration) -> Self {
        Self { value, stored_at: Instant::now(), ttl }
    }

    /// Entry is live while `now - stored_at <= ttl`
    pub fn is_valid(&self) -> bool {
        self.stored_at.elapsed() <= self.ttl
    }

    /// Get time remaining before expiry
    pub fn time_remaining(&self) -> Option<Duration> {
        self.ttl.checked_sub(self.stored_at.elapsed())
    }
}

/// Cache settings
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Global deadline for one upstream fetch
    pub fetch_timeout: Duration,
    /// Maximum entries before eviction
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

struct InFlight {
    generation: u64,
    /// Cleared by invalidate/clear; the fetch still settles for its waiters
    storable: bool,
    fetch: SharedFetch,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    in_flight: HashMap<String, InFlight>,
    next_generation: u64,
}

impl CacheState {
    fn store(&mut self, key: String, value: Value, ttl: Duration, max_entries: usize) {
        if !self.entries.contains_key(&key) && self.entries.len() >= max_entries {
            self.entries.retain(|_, entry| entry.is_valid());
        }

        // Still at capacity after cleanup? Remove oldest entry
        if !self.entries.contains_key(&key) && self.entries.len() >= max_entries {
            if let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone())
            {
                self.entries.remove(&oldest);
            }
        }

        self.entries.insert(key, CacheEntry::new(value, ttl));
    }
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    joins: AtomicU64,
    corrupt: AtomicU64,
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub in_flight: usize,
    /// Served from a live entry
    pub hits: u64,
    /// Started a new upstream fetch
    pub misses: u64,
    /// Joined a fetch already in flight
    pub joins: u64,
    /// Stored payloads that failed to decode
    pub corrupt: u64,
}

/// TTL cache with per-key in-flight de-duplication
///
/// Cloning shares the same underlying state.
#[derive(Clone)]
pub struct SingleFlightCache {
    state: Arc<Mutex<CacheState>>,
    counters: Arc<CacheCounters>,
    config: CacheConfig,
}

impl Default for SingleFlightCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl SingleFlightCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::default())),
            counters: Arc::new(CacheCounters::default()),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the cached value for `key`, join the fetch in flight for it, or
    /// start a new fetch with `fetch_fn`.
    ///
    /// A failed fetch is not cached; every waiter receives the same error.
    pub async fn get_or_fetch<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        fetch_fn: F,
    ) -> Result<T, ProviderError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>> + Send + 'static,
    {
        // Check entry, else join in-flight, else register in-flight: no await in between
        let fetch = {
            let mut state = self.lock_state();

            if let Some(entry) = state.entries.get(key) {
                if entry.is_valid() {
                    match serde_json::from_value::<T>(entry.value.clone()) {
                        Ok(value) => {
                            self.counters.hits.fetch_add(1, Ordering::Relaxed);
                            return Ok(value);
                        }
                        Err(e) => {
                            self.counters.corrupt.fetch_add(1, Ordering::Relaxed);
                            warn!(key, error = %e, "Corrupt cache entry, purging");
                            state.entries.remove(key);
                        }
                    }
                } else {
                    state.entries.remove(key);
                }
            }

            match state.in_flight.get(key) {
                Some(in_flight) => {
                    self.counters.joins.fetch_add(1, Ordering::Relaxed);
                    debug!(key, "Joining in-flight fetch");
                    in_flight.fetch.clone()
                }
                None => {
                    self.counters.misses.fetch_add(1, Ordering::Relaxed);
                    let generation = state.next_generation;
                    state.next_generation += 1;

                    let fetch = self.settle(key.to_string(), ttl, generation, fetch_fn());
                    state.in_flight.insert(
                        key.to_string(),
                        InFlight { generation, storable: true, fetch: fetch.clone() },
                    );
                    fetch
                }
            }
        };

        let value = fetch.await?;
        serde_json::from_value(value)
            .map_err(|e| ProviderError::DataShape(format!("cached value for {}: {}", key, e)))
    }

    /// Wrap the upstream future with the timeout guard and settle bookkeeping
    fn settle<T, Fut>(&self, key: String, ttl: Duration, generation: u64, upstream: Fut) -> SharedFetch
    where
        T: Serialize + Send + 'static,
        Fut: Future<Output = Result<T, ProviderError>> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let timeout = self.config.fetch_timeout;
        let max_entries = self.config.max_entries.max(1);

        async move {
            let outcome = match tokio::time::timeout(timeout, upstream).await {
                Ok(Ok(value)) => serde_json::to_value(value)
                    .map_err(|e| ProviderError::DataShape(format!("unserializable value: {}", e))),
                Ok(Err(e)) => Err(e),
                Err(_) => {
                    warn!(key = %key, "Fetch timed out after {:?}, abandoning", timeout);
                    Err(ProviderError::Timeout(timeout))
                }
            };

            let mut state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let record = state.in_flight.get(&key).map(|f| (f.generation, f.storable));
            let mut storable = false;
            if let Some((current, keep)) = record {
                if current == generation {
                    state.in_flight.remove(&key);
                    storable = keep;
                }
            }
            if storable {
                if let Ok(value) = &outcome {
                    state.store(key, value.clone(), ttl, max_entries);
                }
            }

            outcome
        }
        .boxed()
        .shared()
    }

    /// Drop a cached entry. A fetch in flight for it keeps serving joiners
    /// but will not store its result.
    pub fn invalidate(&self, key: &str) {
        let mut state = self.lock_state();
        state.entries.remove(key);
        if let Some(in_flight) = state.in_flight.get_mut(key) {
            in_flight.storable = false;
        }
    }

    /// Remove expired entries
    pub fn cleanup(&self) {
        self.lock_state().entries.retain(|_, entry| entry.is_valid());
    }

    /// Clear entries and counters; fetches in flight finish without storing
    pub fn clear(&self) {
        let mut state = self.lock_state();
        state.entries.clear();
        for in_flight in state.in_flight.values_mut() {
            in_flight.storable = false;
        }
        self.counters.hits.store(0, Ordering::Relaxed);
        self.counters.misses.store(0, Ordering::Relaxed);
        self.counters.joins.store(0, Ordering::Relaxed);
        self.counters.corrupt.store(0, Ordering::Relaxed);
    }

    /// Whether a live entry exists
    pub fn contains(&self, key: &str) -> bool {
        self.lock_state()
            .entries
            .get(key)
            .map(|entry| entry.is_valid())
            .unwrap_or(false)
    }

    /// Get the number of entries (including expired)
    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_state().entries.is_empty()
    }

    pub fn in_flight_count(&self) -> usize {
        self.lock_state().in_flight.len()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock_state();
        let total = state.entries.len();
        let valid = state.entries.values().filter(|e| e.is_valid()).count();

        CacheStats {
            total_entries: total,
            valid_entries: valid,
            expired_entries: total - valid,
            in_flight: state.in_flight.len(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            joins: self.counters.joins.load(Ordering::Relaxed),
            corrupt: self.counters.corrupt.load(Ordering::Relaxed),
        }
    }

    /// Store a raw payload directly, bypassing fetch and type checks
    pub fn insert_raw(&self, key: &str, value: Value, ttl: Duration) {
        let max_entries = self.config.max_entries.max(1);
        self.lock_state().store(key.to_string(), value, ttl, max_entries);
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for SingleFlightCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlightCache")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counting_fetch(
        counter: &Arc<AtomicUsize>,
        value: u64,
        delay: Duration,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<u64, ProviderError>> {
        let counter = Arc::clone(counter);
        move || {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_fetch() {
        let cache = SingleFlightCache::default();
        let counter = Arc::new(AtomicUsize::new(0));

        let calls = (0..10).map(|i| {
            let cache = cache.clone();
            let fetch = counting_fetch(&counter, 100 + i, Duration::from_millis(500));
            async move { cache.get_or_fetch("mint:abc", Duration::from_secs(30), fetch).await }
        });
        let results = futures::future::join_all(calls).await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        // Everyone got the first caller's value
        assert!(results.iter().all(|r| r == &Ok(100)));

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.joins, 9);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_triggers_refetch() {
        let cache = SingleFlightCache::default();
        let counter = Arc::new(AtomicUsize::new(0));
        let ttl = Duration::from_secs(5);

        let first = cache.get_or_fetch("k", ttl, counting_fetch(&counter, 1, Duration::ZERO)).await;
        assert_eq!(first, Ok(1));

        tokio::time::advance(Duration::from_secs(4)).await;
        let cached = cache.get_or_fetch("k", ttl, counting_fetch(&counter, 2, Duration::ZERO)).await;
        assert_eq!(cached, Ok(1));
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        let refreshed = cache.get_or_fetch("k", ttl, counting_fetch(&counter, 3, Duration::ZERO)).await;
        assert_eq!(refreshed, Ok(3));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_broadcast_and_not_cached() {
        let cache = SingleFlightCache::default();
        let counter = Arc::new(AtomicUsize::new(0));

        let calls = (0..5).map(|_| {
            let cache = cache.clone();
            let counter = Arc::clone(&counter);
            async move {
                cache
                    .get_or_fetch::<u64, _, _>("k", Duration::from_secs(30), move || async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Err(ProviderError::fatal("boom"))
                    })
                    .await
            }
        });
        let results = futures::future::join_all(calls).await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r == &Err(ProviderError::fatal("boom"))));
        assert!(!cache.contains("k"));
        assert_eq!(cache.in_flight_count(), 0);

        // Next caller starts a fresh fetch
        let retry = cache
            .get_or_fetch("k", Duration::from_secs(30), counting_fetch(&counter, 9, Duration::ZERO))
            .await;
        assert_eq!(retry, Ok(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_clears_in_flight() {
        let cache = SingleFlightCache::new(CacheConfig {
            fetch_timeout: Duration::from_secs(1),
            ..Default::default()
        });
        let counter = Arc::new(AtomicUsize::new(0));

        let slow = cache
            .get_or_fetch("k", Duration::from_secs(30), counting_fetch(&counter, 1, Duration::from_secs(10)))
            .await;
        assert_eq!(slow, Err(ProviderError::Timeout(Duration::from_secs(1))));
        assert_eq!(cache.in_flight_count(), 0);
        assert!(!cache.contains("k"));

        let fast = cache
            .get_or_fetch("k", Duration::from_secs(30), counting_fetch(&counter, 2, Duration::ZERO))
            .await;
        assert_eq!(fast, Ok(2));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_corrupt_entry_purged_and_refetched() {
        let cache = SingleFlightCache::default();
        let counter = Arc::new(AtomicUsize::new(0));
        cache.insert_raw("k", json!({"unexpected": "shape"}), Duration::from_secs(60));

        let value = cache
            .get_or_fetch("k", Duration::from_secs(60), counting_fetch(&counter, 7, Duration::ZERO))
            .await;

        assert_eq!(value, Ok(7));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().corrupt, 1);

        // The refetched value replaced the corrupt one
        let again = cache
            .get_or_fetch("k", Duration::from_secs(60), counting_fetch(&counter, 8, Duration::ZERO))
            .await;
        assert_eq!(again, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_entries_evicts_oldest() {
        let cache = SingleFlightCache::new(CacheConfig { max_entries: 3, ..Default::default() });

        for i in 0..5u64 {
            cache
                .get_or_fetch(&format!("k{}", i), Duration::from_secs(60), move || async move { Ok(i) })
                .await
                .unwrap();
            tokio::time::advance(Duration::from_millis(10)).await;
        }

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains("k0"));
        assert!(cache.contains("k4"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_during_fetch_does_not_store() {
        let cache = SingleFlightCache::default();
        let counter = Arc::new(AtomicUsize::new(0));

        let pending = {
            let cache = cache.clone();
            let fetch = counting_fetch(&counter, 1, Duration::from_millis(200));
            tokio::spawn(async move { cache.get_or_fetch("k", Duration::from_secs(60), fetch).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.invalidate("k");

        assert_eq!(pending.await.unwrap(), Ok(1));
        assert!(!cache.contains("k"));
        assert_eq!(cache.in_flight_count(), 0);
    }

    /// Tracks how many upstream calls overlap
    fn overlapping_fetch(
        active: &Arc<AtomicUsize>,
        peak: &Arc<AtomicUsize>,
        value: u64,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<u64, ProviderError>> {
        let active = Arc::clone(active);
        let peak = Arc::clone(peak);
        move || {
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(200)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(value)
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_keeps_one_upstream_call_per_key() {
        let cache = SingleFlightCache::default();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let first = {
            let cache = cache.clone();
            let fetch = overlapping_fetch(&active, &peak, 1);
            tokio::spawn(async move { cache.get_or_fetch("k", Duration::from_secs(60), fetch).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.invalidate("k");

        let second = {
            let cache = cache.clone();
            let fetch = overlapping_fetch(&active, &peak, 2);
            tokio::spawn(async move { cache.get_or_fetch("k", Duration::from_secs(60), fetch).await })
        };

        assert_eq!(first.await.unwrap(), Ok(1));
        assert_eq!(second.await.unwrap(), Ok(1), "joined the fetch already running");
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(!cache.contains("k"));

        // Once settled, the next caller fetches fresh
        let fresh = cache
            .get_or_fetch("k", Duration::from_secs(60), overlapping_fetch(&active, &peak, 3))
            .await;
        assert_eq!(fresh, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_during_fetch_joins_and_does_not_store() {
        let cache = SingleFlightCache::default();
        let counter = Arc::new(AtomicUsize::new(0));

        let first = {
            let cache = cache.clone();
            let fetch = counting_fetch(&counter, 1, Duration::from_millis(200));
            tokio::spawn(async move { cache.get_or_fetch("k", Duration::from_secs(60), fetch).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.clear();

        let second = cache
            .get_or_fetch("k", Duration::from_secs(60), counting_fetch(&counter, 2, Duration::ZERO))
            .await;

        assert_eq!(second, Ok(1));
        assert_eq!(first.await.unwrap(), Ok(1));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_entry_time_remaining() {
        let entry = CacheEntry::new(json!(1), Duration::from_secs(60));
        assert!(entry.is_valid());
        assert!(entry.time_remaining().unwrap() <= Duration::from_secs(60));
    }
}
