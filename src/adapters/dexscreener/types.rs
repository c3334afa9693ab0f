//! DexScreener response types

use serde::{Deserialize, Serialize};

use crate::domain::{CandidateOrigin, FeedFields, TokenCandidate};

/// Chain id DexScreener uses for Solana
pub const SOLANA_CHAIN_ID: &str = "solana";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairToken {
    pub address: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Liquidity {
    pub usd: Option<f64>,
    pub base: Option<f64>,
    pub quote: Option<f64>,
}

/// One DEX pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexPair {
    pub chain_id: String,
    pub dex_id: String,
    pub pair_address: String,
    pub base_token: PairToken,
    pub quote_token: PairToken,
    pub price_usd: Option<String>,
    pub liquidity: Option<Liquidity>,
    pub market_cap: Option<f64>,
    pub fdv: Option<f64>,
    /// Milliseconds since the epoch
    pub pair_created_at: Option<i64>,
}

impl DexPair {
    /// USD liquidity, zero when unreported
    pub fn liquidity_usd(&self) -> f64 {
        self.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0)
    }

    pub fn price_usd(&self) -> Option<f64> {
        self.price_usd.as_deref().and_then(|p| p.parse().ok())
    }
}

/// `latest/dex/pairs/{chain}/{pair}` response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairLookupResponse {
    #[serde(default)]
    pub pair: Option<DexPair>,
    #[serde(default)]
    pub pairs: Option<Vec<DexPair>>,
}

impl PairLookupResponse {
    pub fn into_pair(self) -> Option<DexPair> {
        self.pair
            .or_else(|| self.pairs.and_then(|pairs| pairs.into_iter().next()))
    }
}

/// One entry of the latest boosted tokens feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBoost {
    pub chain_id: String,
    pub token_address: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

impl TokenBoost {
    pub fn is_solana(&self) -> bool {
        self.chain_id.eq_ignore_ascii_case(SOLANA_CHAIN_ID)
    }

    pub fn into_candidate(self) -> TokenCandidate {
        TokenCandidate::new(self.token_address, CandidateOrigin::BoostFeed).with_feed(FeedFields {
            boost_amount: self.amount,
            total_boost_amount: self.total_amount,
            ..Default::default()
        })
    }
}

/// Aggregate view of every pool of one token
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolSummary {
    pub pool_count: usize,
    /// Deepest pool liquidity in USD
    pub liquidity_usd: f64,
    /// Price from the deepest pool
    pub price_usd: Option<f64>,
    pub deepest_pair: Option<String>,
    /// Earliest pool creation, milliseconds since the epoch
    pub first_created_at_ms: Option<i64>,
}

impl PoolSummary {
    pub fn from_pairs(pairs: &[DexPair]) -> Self {
        let deepest = pairs
            .iter()
            .max_by(|a, b| a.liquidity_usd().total_cmp(&b.liquidity_usd()));

        Self {
            pool_count: pairs.len(),
            liquidity_usd: deepest.map(|p| p.liquidity_usd()).unwrap_or(0.0),
            price_usd: deepest.and_then(|p| p.price_usd()),
            deepest_pair: deepest.map(|p| p.pair_address.clone()),
            first_created_at_ms: pairs.iter().filter_map(|p| p.pair_created_at).min(),
        }
    }

    /// Seconds between the first pool and `now_secs`
    pub fn age_secs(&self, now_secs: i64) -> Option<i64> {
        self.first_created_at_ms
            .map(|created_ms| (now_secs - created_ms / 1000).max(0))
    }
}
