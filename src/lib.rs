//! Mintwatch - New-mint detection for Solana
//!
//! Watches newly launched tokens, filters them against per-user criteria and
//! triggers exactly one purchase attempt per armed user.
//!
//! # Modules
//!
//! - `domain`: Core logic (TokenCandidate, UserCriteria, FilterEvaluator, WatcherSet)
//! - `ports`: Trait abstractions (TokenDataSource, CandidateSource, collaborators)
//! - `adapters`: External implementations (rate-limited access, cache, Solana RPC,
//!   DexScreener, pump.fun, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Detection engine

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
