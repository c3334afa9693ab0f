//! Provider endpoints and per-call rotation

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ports::ProviderError;

/// One upstream base address plus optional credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    /// Base URL
    pub url: String,
    /// API key, if the provider wants one
    #[serde(default)]
    pub api_key: Option<String>,
}

impl ProviderEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), api_key: None }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Base URL with trailing slashes removed
    pub fn base(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

// Keys stay out of logs
impl fmt::Debug for ProviderEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEndpoint")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Endpoints serving the same capability.
///
/// Every call picks one uniformly at random; there is no affinity between calls.
#[derive(Debug, Clone)]
pub struct EndpointPool {
    endpoints: Vec<ProviderEndpoint>,
}

impl EndpointPool {
    pub fn new(endpoints: Vec<ProviderEndpoint>) -> Result<Self, ProviderError> {
        if endpoints.is_empty() {
            return Err(ProviderError::Validation("endpoint pool is empty".into()));
        }
        Ok(Self { endpoints })
    }

    pub fn single(endpoint: ProviderEndpoint) -> Self {
        Self { endpoints: vec![endpoint] }
    }

    /// Pick an endpoint for one call
    pub fn pick(&self) -> &ProviderEndpoint {
        if self.endpoints.len() == 1 {
            return &self.endpoints[0];
        }
        let idx = rand::thread_rng().gen_range(0..self.endpoints.len());
        &self.endpoints[idx]
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn endpoints(&self) -> &[ProviderEndpoint] {
        &self.endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_empty_pool_rejected() {
        assert!(matches!(EndpointPool::new(vec![]), Err(ProviderError::Validation(_))));
    }

    #[test]
    fn test_pick_spreads_across_endpoints() {
        let pool = EndpointPool::new(vec![
            ProviderEndpoint::new("https://a.example"),
            ProviderEndpoint::new("https://b.example"),
            ProviderEndpoint::new("https://c.example"),
        ])
        .unwrap();

        let seen: HashSet<&str> = (0..300).map(|_| pool.pick().url.as_str()).collect();
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let endpoint = ProviderEndpoint::new("https://rpc.example").with_api_key("secret-key");
        let printed = format!("{:?}", endpoint);
        assert!(!printed.contains("secret-key"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_base_trims_trailing_slash() {
        assert_eq!(ProviderEndpoint::new("https://api.example/").base(), "https://api.example");
    }
}
