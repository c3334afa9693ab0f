//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Access: rate-limited, retrying gateway shared by every provider call
//! - Cache: single-flight TTL cache for provider lookups
//! - Solana / DexScreener: upstream clients
//! - Providers: cached facade implementing `TokenDataSource`
//! - Pump.fun / Sources: candidate discovery by subscription or polling
//! - Collaborators: settings, notifications, dry-run purchases
//! - CLI: Command-line interface handlers

pub mod access;
pub mod cache;
pub mod cli;
pub mod collaborators;
pub mod dexscreener;
pub mod providers;
pub mod pump_fun;
pub mod solana;
pub mod sources;

pub use cli::CliApp;
pub use providers::{CacheTtls, ProviderClients};
