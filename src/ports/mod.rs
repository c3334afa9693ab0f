//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - Token data (liquidity, authorities, holder concentration, age)
//! - Candidate discovery (push subscription or polled feed)
//! - Collaborators outside the core (purchase, settings, notifications)

pub mod candidate_source;
pub mod collaborators;
pub mod mocks;
pub mod token_data;

use std::time::Duration;

use thiserror::Error;

pub use candidate_source::{CandidateSource, CandidateSourceFactory};
pub use collaborators::{NotifierPort, PurchasePort, SettingsPort};
pub use token_data::{MintAuthorities, TokenDataSource};

/// Provider access error type
///
/// `Clone` so one settled upstream result can be handed to every waiter of a
/// single-flight fetch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Malformed address or input; no network call was made
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Retryable upstream failure (429/500/502/503, reset, connect timeout)
    #[error("Transient provider error{}: {message}", status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Transient { status: Option<u16>, message: String },

    /// Non-retryable upstream failure
    #[error("Provider request failed{}: {message}", status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Fatal { status: Option<u16>, message: String },

    /// Global fetch deadline exceeded
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Response parsed but did not have the expected structure
    #[error("Unexpected response shape: {0}")]
    DataShape(String),

    /// Transient failures persisted past the retry budget
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<ProviderError> },
}

impl ProviderError {
    pub fn transient(message: impl Into<String>) -> Self {
        ProviderError::Transient { status: None, message: message.into() }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        ProviderError::Fatal { status: None, message: message.into() }
    }

    /// Whether the retry layer may try again
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Transient { .. })
    }

    /// Whether the failure happened before any network call
    pub fn is_validation(&self) -> bool {
        matches!(self, ProviderError::Validation(_))
    }
}

/// Collaborator error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortError {
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Failed(String),
}
