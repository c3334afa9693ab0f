//! Solana RPC adapter

pub mod client;
pub mod types;

pub use client::{validate_address, SolanaRpcClient, DEFAULT_REQUEST_TIMEOUT};
pub use types::{MintAccount, TokenSupply};
