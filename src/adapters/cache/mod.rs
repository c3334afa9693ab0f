//! Caching for provider lookups
//!
//! Key namespaces used by the provider clients:
//! - `mint:<address>` parsed mint account
//! - `supply:<address>` token supply
//! - `holders:<address>` largest token accounts
//! - `pools:<address>` DEX pools for a token
//! - `pair:<address>` pair metadata
//! - `boosts:latest` boosted token feed

mod single_flight;

pub use single_flight::{
    CacheConfig, CacheEntry, CacheStats, SingleFlightCache, DEFAULT_FETCH_TIMEOUT,
    DEFAULT_MAX_ENTRIES,
};

/// Build a namespaced cache key
pub fn cache_key(namespace: &str, id: &str) -> String {
    format!("{}:{}", namespace, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key() {
        assert_eq!(cache_key("mint", "So111"), "mint:So111");
    }
}
