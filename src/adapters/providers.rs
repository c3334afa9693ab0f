//! Provider Clients
//!
//! Typed accessors over the Solana RPC and DexScreener clients. Every lookup
//! goes through the single-flight cache, so concurrent evaluations of the same
//! mint share one upstream call. Implements `TokenDataSource` for the filter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::access::duration_ms;
use super::cache::{cache_key, SingleFlightCache};
use super::dexscreener::{DexPair, DexScreenerClient, PoolSummary};
use super::solana::{MintAccount, SolanaRpcClient, TokenSupply};
use crate::domain::{holder_concentration_pct, TokenCandidate, TokenSnapshot};
use crate::ports::{MintAuthorities, ProviderError, TokenDataSource};

/// Cache lifetime per data kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTtls {
    #[serde(with = "duration_ms")]
    pub mint_account: Duration,
    #[serde(with = "duration_ms")]
    pub supply: Duration,
    #[serde(with = "duration_ms")]
    pub holders: Duration,
    #[serde(with = "duration_ms")]
    pub pools: Duration,
    #[serde(with = "duration_ms")]
    pub pair: Duration,
    #[serde(with = "duration_ms")]
    pub boosts: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            mint_account: Duration::from_secs(60),
            supply: Duration::from_secs(60),
            holders: Duration::from_secs(30),
            pools: Duration::from_secs(30),
            pair: Duration::from_secs(30),
            boosts: Duration::from_millis(1000),
        }
    }
}

/// Cached facade over every upstream provider
#[derive(Debug, Clone)]
pub struct ProviderClients {
    rpc: Arc<SolanaRpcClient>,
    dex: Arc<DexScreenerClient>,
    cache: SingleFlightCache,
    ttls: CacheTtls,
}

impl ProviderClients {
    pub fn new(
        rpc: SolanaRpcClient,
        dex: DexScreenerClient,
        cache: SingleFlightCache,
        ttls: CacheTtls,
    ) -> Self {
        Self {
            rpc: Arc::new(rpc),
            dex: Arc::new(dex),
            cache,
            ttls,
        }
    }

    pub fn cache(&self) -> &SingleFlightCache {
        &self.cache
    }

    pub fn rpc(&self) -> &SolanaRpcClient {
        &self.rpc
    }

    pub fn dexscreener(&self) -> &DexScreenerClient {
        &self.dex
    }

    pub async fn mint_account(&self, mint: &str) -> Result<MintAccount, ProviderError> {
        let rpc = Arc::clone(&self.rpc);
        let owned = mint.to_string();
        self.cache
            .get_or_fetch(&cache_key("mint", mint), self.ttls.mint_account, move || async move {
                rpc.get_mint_account(&owned).await
            })
            .await
    }

    pub async fn token_supply(&self, mint: &str) -> Result<TokenSupply, ProviderError> {
        let rpc = Arc::clone(&self.rpc);
        let owned = mint.to_string();
        self.cache
            .get_or_fetch(&cache_key("supply", mint), self.ttls.supply, move || async move {
                rpc.get_token_supply(&owned).await
            })
            .await
    }

    /// Largest token account balances, largest first
    pub async fn largest_balances(&self, mint: &str) -> Result<Vec<u64>, ProviderError> {
        let rpc = Arc::clone(&self.rpc);
        let owned = mint.to_string();
        self.cache
            .get_or_fetch(&cache_key("holders", mint), self.ttls.holders, move || async move {
                rpc.get_largest_balances(&owned).await
            })
            .await
    }

    pub async fn pools(&self, mint: &str) -> Result<Vec<DexPair>, ProviderError> {
        let dex = Arc::clone(&self.dex);
        let owned = mint.to_string();
        self.cache
            .get_or_fetch(&cache_key("pools", mint), self.ttls.pools, move || async move {
                dex.token_pairs(&owned).await
            })
            .await
    }

    pub async fn pool_summary(&self, mint: &str) -> Result<PoolSummary, ProviderError> {
        Ok(PoolSummary::from_pairs(&self.pools(mint).await?))
    }

    pub async fn pair(&self, pair_address: &str) -> Result<Option<DexPair>, ProviderError> {
        let dex = Arc::clone(&self.dex);
        let owned = pair_address.to_string();
        self.cache
            .get_or_fetch(&cache_key("pair", pair_address), self.ttls.pair, move || async move {
                dex.pair(&owned).await
            })
            .await
    }

    /// Latest boosted Solana tokens as candidates, feed order preserved
    pub async fn boosted_candidates(&self) -> Result<Vec<TokenCandidate>, ProviderError> {
        let dex = Arc::clone(&self.dex);
        let boosts = self
            .cache
            .get_or_fetch("boosts:latest", self.ttls.boosts, move || async move {
                dex.latest_boosts().await
            })
            .await?;

        Ok(boosts.into_iter().map(|b| b.into_candidate()).collect())
    }

    /// Assemble a snapshot with conservative defaults for whatever fails.
    ///
    /// Not used for filtering: the filter fails closed on errors instead.
    pub async fn snapshot(&self, candidate: &TokenCandidate, top_n: usize) -> TokenSnapshot {
        let mint = candidate.mint.as_str();
        let (pools, authorities, concentration) = tokio::join!(
            self.pool_summary(mint),
            self.authorities(mint),
            self.top_holders_pct(mint, top_n),
        );

        let mut snapshot = TokenSnapshot {
            mint: candidate.mint.clone(),
            ..Default::default()
        };

        match pools {
            Ok(summary) => {
                snapshot.liquidity_usd = summary.liquidity_usd;
                snapshot.price_usd = summary.price_usd;
                snapshot.age_secs = summary.age_secs(chrono::Utc::now().timestamp());
            }
            Err(e) => {
                warn!(mint, error = %e, "Pool lookup failed, assuming zero liquidity");
                snapshot.failed.push("pools".to_string());
            }
        }

        match authorities {
            Ok(auth) => {
                snapshot.has_mint_authority = auth.has_mint_authority;
                snapshot.has_freeze_authority = auth.has_freeze_authority;
            }
            Err(e) => {
                warn!(mint, error = %e, "Mint account lookup failed, assuming no authorities");
                snapshot.failed.push("authorities".to_string());
            }
        }

        match concentration {
            Ok(pct) => snapshot.top_holders_pct = pct,
            Err(e) => {
                warn!(mint, error = %e, "Holder lookup failed, assuming zero concentration");
                snapshot.failed.push("top_holders".to_string());
            }
        }

        debug!(mint, complete = snapshot.is_complete(), "Snapshot assembled");
        snapshot
    }
}

#[async_trait]
impl TokenDataSource for ProviderClients {
    async fn liquidity_usd(&self, mint: &str) -> Result<f64, ProviderError> {
        Ok(self.pool_summary(mint).await?.liquidity_usd)
    }

    async fn authorities(&self, mint: &str) -> Result<MintAuthorities, ProviderError> {
        let account = self.mint_account(mint).await?;
        Ok(MintAuthorities {
            has_mint_authority: account.has_mint_authority(),
            has_freeze_authority: account.has_freeze_authority(),
        })
    }

    async fn top_holders_pct(&self, mint: &str, top_n: usize) -> Result<f64, ProviderError> {
        let (balances, supply) = tokio::try_join!(self.largest_balances(mint), self.token_supply(mint))?;
        holder_concentration_pct(&balances, supply.amount, top_n)
    }

    async fn age_secs(&self, mint: &str) -> Result<Option<i64>, ProviderError> {
        let summary = self.pool_summary(mint).await?;
        Ok(summary.age_secs(chrono::Utc::now().timestamp()))
    }
}
