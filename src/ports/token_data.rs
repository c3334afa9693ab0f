//! Token data port
//!
//! What the filter evaluator reads about a candidate. Each accessor is fetched
//! lazily so predicates that are skipped never cost a provider call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ProviderError;

/// Authority flags of a mint account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintAuthorities {
    pub has_mint_authority: bool,
    pub has_freeze_authority: bool,
}

/// Lazily fetched token attributes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenDataSource: Send + Sync {
    /// Best pool liquidity in USD
    async fn liquidity_usd(&self, mint: &str) -> Result<f64, ProviderError>;

    /// Mint and freeze authority presence
    async fn authorities(&self, mint: &str) -> Result<MintAuthorities, ProviderError>;

    /// Percentage of total supply held by the `top_n` largest accounts
    async fn top_holders_pct(&self, mint: &str, top_n: usize) -> Result<f64, ProviderError>;

    /// Seconds since the earliest pool was created (`None` when no pool exists)
    async fn age_secs(&self, mint: &str) -> Result<Option<i64>, ProviderError>;
}
