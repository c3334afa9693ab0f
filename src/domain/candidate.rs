//! Token Candidates
//!
//! A candidate is a freshly discovered mint. Its identity (the mint address) never
//! changes; everything else about it is derived lazily from providers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a candidate was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOrigin {
    /// Pushed by a new-mint subscription (e.g. pump.fun create events)
    Subscription,
    /// Pulled from the boosted/listed tokens feed
    BoostFeed,
    /// Supplied manually (CLI inspect, tests)
    Manual,
}

impl fmt::Display for CandidateOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateOrigin::Subscription => write!(f, "subscription"),
            CandidateOrigin::BoostFeed => write!(f, "boost_feed"),
            CandidateOrigin::Manual => write!(f, "manual"),
        }
    }
}

/// Fields reported by the feed that produced the candidate.
///
/// These come for free with the discovery event, so filters on them cost no
/// network calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedFields {
    /// Boost amount attached to the listing (boost feed only)
    pub boost_amount: Option<f64>,
    /// Cumulative boost total for the token (boost feed only)
    pub total_boost_amount: Option<f64>,
    /// Market cap in SOL at creation (subscription only)
    pub market_cap_sol: Option<f64>,
    /// Token symbol, when the feed carries one
    pub symbol: Option<String>,
    /// Token name, when the feed carries one
    pub name: Option<String>,
}

/// A newly discovered mint awaiting evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenCandidate {
    /// Mint address (base58)
    pub mint: String,
    /// Discovery channel
    pub origin: CandidateOrigin,
    /// Feed-provided attributes
    #[serde(default)]
    pub feed: FeedFields,
    /// Unix seconds when the candidate was discovered
    pub discovered_at: i64,
}

impl TokenCandidate {
    /// Create a candidate discovered now
    pub fn new(mint: impl Into<String>, origin: CandidateOrigin) -> Self {
        Self {
            mint: mint.into(),
            origin,
            feed: FeedFields::default(),
            discovered_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Attach feed fields
    pub fn with_feed(mut self, feed: FeedFields) -> Self {
        self.feed = feed;
        self
    }

    /// Short label for logs and notifications
    pub fn label(&self) -> String {
        match &self.feed.symbol {
            Some(symbol) => format!("{} ({})", symbol, self.mint),
            None => self.mint.clone(),
        }
    }
}

/// Derived attributes of a candidate, assembled with conservative defaults.
///
/// Missing data is reported as zero liquidity, no authority and zero
/// concentration; the `failed` list names the components that could not be
/// fetched so readers can tell a default from a measurement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub mint: String,
    /// Best pool liquidity in USD
    pub liquidity_usd: f64,
    /// Price in USD from the deepest pool
    pub price_usd: Option<f64>,
    /// Mint authority still present
    pub has_mint_authority: bool,
    /// Freeze authority still present
    pub has_freeze_authority: bool,
    /// Share of supply held by the top-N accounts (0-100)
    pub top_holders_pct: f64,
    /// Seconds since the earliest pool was created
    pub age_secs: Option<i64>,
    /// Components that fell back to defaults
    pub failed: Vec<String>,
}

impl TokenSnapshot {
    /// Whether every component was actually fetched
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_label_prefers_symbol() {
        let candidate = TokenCandidate::new("Mint111", CandidateOrigin::BoostFeed).with_feed(FeedFields {
            symbol: Some("WIF".to_string()),
            ..Default::default()
        });
        assert_eq!(candidate.label(), "WIF (Mint111)");

        let bare = TokenCandidate::new("Mint222", CandidateOrigin::Manual);
        assert_eq!(bare.label(), "Mint222");
    }

    #[test]
    fn test_snapshot_completeness() {
        let mut snapshot = TokenSnapshot::default();
        assert!(snapshot.is_complete());
        snapshot.failed.push("holders".to_string());
        assert!(!snapshot.is_complete());
    }

    #[test]
    fn test_origin_display() {
        assert_eq!(CandidateOrigin::Subscription.to_string(), "subscription");
        assert_eq!(CandidateOrigin::BoostFeed.to_string(), "boost_feed");
    }
}
