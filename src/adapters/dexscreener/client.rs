//! DexScreener HTTP client
//!
//! Endpoints:
//! - `token-boosts/latest/v1` latest boosted tokens (all chains, filtered here)
//! - `token-pairs/v1/solana/{mint}` every pool for a token
//! - `latest/dex/pairs/solana/{pair}` a single pair

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{DexPair, PairLookupResponse, TokenBoost, SOLANA_CHAIN_ID};
use crate::adapters::access::{fetch_json, RateLimitedAccess};
use crate::adapters::solana::validate_address;
use crate::ports::ProviderError;

/// Public API base
pub const DEXSCREENER_BASE_URL: &str = "https://api.dexscreener.com";

#[derive(Debug, Clone)]
pub struct DexScreenerClient {
    access: Arc<RateLimitedAccess>,
    http: Client,
}

impl DexScreenerClient {
    pub fn new(access: Arc<RateLimitedAccess>, request_timeout: Duration) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ProviderError::fatal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { access, http })
    }

    pub fn access(&self) -> &RateLimitedAccess {
        &self.access
    }

    /// Latest boosted tokens on Solana, feed order preserved
    pub async fn latest_boosts(&self) -> Result<Vec<TokenBoost>, ProviderError> {
        let boosts: Vec<TokenBoost> = self.get_json("token-boosts/latest/v1").await?;
        let total = boosts.len();
        let solana: Vec<TokenBoost> = boosts.into_iter().filter(|b| b.is_solana()).collect();
        debug!(total, solana = solana.len(), "Fetched latest boosts");
        Ok(solana)
    }

    /// Every pool trading `mint`
    pub async fn token_pairs(&self, mint: &str) -> Result<Vec<DexPair>, ProviderError> {
        validate_address(mint)?;
        self.get_json(&format!("token-pairs/v1/{}/{}", SOLANA_CHAIN_ID, mint))
            .await
    }

    /// One pair by address; `None` when DexScreener does not know it
    pub async fn pair(&self, pair_address: &str) -> Result<Option<DexPair>, ProviderError> {
        validate_address(pair_address)?;
        let response: PairLookupResponse = self
            .get_json(&format!("latest/dex/pairs/{}/{}", SOLANA_CHAIN_ID, pair_address))
            .await?;
        Ok(response.into_pair())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        self.access
            .schedule(|endpoint| {
                let url = format!("{}/{}", endpoint.base(), path);
                let mut request = self.http.get(&url);
                if let Some(key) = &endpoint.api_key {
                    request = request.header("X-API-KEY", key);
                }
                fetch_json(request)
            })
            .await
    }
}
