//! DexScreener adapter: boosted feed, pools and pair metadata

pub mod client;
pub mod types;

pub use client::{DexScreenerClient, DEXSCREENER_BASE_URL};
pub use types::{DexPair, PoolSummary, TokenBoost, SOLANA_CHAIN_ID};
