//! Filter Evaluator
//!
//! Decides whether a candidate satisfies one user's criteria. Predicates run in
//! a fixed order, cheapest first, and stop at the first failure. Token data is
//! fetched lazily, so a skipped predicate never costs a provider call.
//!
//! Any error while evaluating a predicate rejects the candidate: the evaluator
//! cannot tell "unknown" apart from "unsafe", so it fails closed.

use std::fmt;

use tracing::{debug, warn};

use super::candidate::TokenCandidate;
use super::criteria::UserCriteria;
use crate::ports::{MintAuthorities, ProviderError, TokenDataSource};

/// Default number of largest accounts used for concentration
pub const DEFAULT_TOP_HOLDERS: usize = 10;

/// Individual predicates, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predicate {
    BoostAmount,
    MarketCap,
    Liquidity,
    MintAuthority,
    FreezeAuthority,
    Age,
    TopHolders,
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Predicate::BoostAmount => "boost_amount",
            Predicate::MarketCap => "market_cap",
            Predicate::Liquidity => "liquidity",
            Predicate::MintAuthority => "mint_authority",
            Predicate::FreezeAuthority => "freeze_authority",
            Predicate::Age => "age",
            Predicate::TopHolders => "top_holders",
        };
        f.write_str(name)
    }
}

/// Outcome of a full evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum FilterVerdict {
    /// Every configured predicate passed
    Pass,
    /// The named predicate rejected the candidate
    Reject(Predicate),
    /// The named predicate could not be evaluated
    Error(Predicate, ProviderError),
}

impl FilterVerdict {
    pub fn passed(&self) -> bool {
        matches!(self, FilterVerdict::Pass)
    }
}

impl fmt::Display for FilterVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterVerdict::Pass => write!(f, "pass"),
            FilterVerdict::Reject(p) => write!(f, "rejected by {}", p),
            FilterVerdict::Error(p, e) => write!(f, "{} unavailable: {}", p, e),
        }
    }
}

/// Percentage of supply held by the first `top_n` balances.
///
/// Balances are expected largest-first as returned by the provider; when fewer
/// than `top_n` accounts exist all of them are used.
pub fn holder_concentration_pct(
    balances: &[u64],
    total_supply: u64,
    top_n: usize,
) -> Result<f64, ProviderError> {
    if total_supply == 0 {
        return Err(ProviderError::DataShape("total supply is zero".into()));
    }

    let held: u128 = balances.iter().take(top_n).map(|b| *b as u128).sum();
    Ok(held as f64 / total_supply as f64 * 100.0)
}

/// Composable predicate evaluator
#[derive(Debug, Clone)]
pub struct FilterEvaluator {
    top_n: usize,
}

impl Default for FilterEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_HOLDERS)
    }
}

impl FilterEvaluator {
    pub fn new(top_n: usize) -> Self {
        Self { top_n: top_n.max(1) }
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// Accept or reject; evaluation errors reject
    pub async fn passes(
        &self,
        candidate: &TokenCandidate,
        criteria: &UserCriteria,
        data: &dyn TokenDataSource,
    ) -> bool {
        self.evaluate(candidate, criteria, data).await.passed()
    }

    /// Full evaluation with the reason for a rejection
    pub async fn evaluate(
        &self,
        candidate: &TokenCandidate,
        criteria: &UserCriteria,
        data: &dyn TokenDataSource,
    ) -> FilterVerdict {
        let verdict = self.run(candidate, criteria, data).await;
        match &verdict {
            FilterVerdict::Error(predicate, err) => warn!(
                mint = %candidate.mint,
                predicate = %predicate,
                error = %err,
                "Predicate failed to evaluate, rejecting"
            ),
            other => debug!(mint = %candidate.mint, verdict = %other, "Filter evaluated"),
        }
        verdict
    }

    async fn run(
        &self,
        candidate: &TokenCandidate,
        criteria: &UserCriteria,
        data: &dyn TokenDataSource,
    ) -> FilterVerdict {
        let mint = candidate.mint.as_str();

        // Feed fields first: no network involved
        if let Some(min) = criteria.min_boost_amount {
            match candidate.feed.boost_amount {
                Some(amount) if amount >= min => {}
                _ => return FilterVerdict::Reject(Predicate::BoostAmount),
            }
        }

        if let Some(min) = criteria.min_market_cap_sol {
            match candidate.feed.market_cap_sol {
                Some(cap) if cap >= min => {}
                _ => return FilterVerdict::Reject(Predicate::MarketCap),
            }
        }

        if let Some(min) = criteria.liquidity_threshold {
            match data.liquidity_usd(mint).await {
                Ok(liquidity) if liquidity >= min => {}
                Ok(_) => return FilterVerdict::Reject(Predicate::Liquidity),
                Err(e) => return FilterVerdict::Error(Predicate::Liquidity, e),
            }
        }

        // Mint and freeze share one account fetch
        let mut authorities: Option<MintAuthorities> = None;

        if let Some(requirement) = criteria.require_mint_authority {
            let auth = match data.authorities(mint).await {
                Ok(auth) => *authorities.insert(auth),
                Err(e) => return FilterVerdict::Error(Predicate::MintAuthority, e),
            };
            if !requirement.is_satisfied_by(auth.has_mint_authority) {
                return FilterVerdict::Reject(Predicate::MintAuthority);
            }
        }

        if let Some(requirement) = criteria.require_freeze_authority {
            let auth = match authorities {
                Some(auth) => auth,
                None => match data.authorities(mint).await {
                    Ok(auth) => auth,
                    Err(e) => return FilterVerdict::Error(Predicate::FreezeAuthority, e),
                },
            };
            if !requirement.is_satisfied_by(auth.has_freeze_authority) {
                return FilterVerdict::Reject(Predicate::FreezeAuthority);
            }
        }

        if let Some(max_age) = criteria.max_age_secs {
            match data.age_secs(mint).await {
                Ok(Some(age)) if age <= max_age => {}
                Ok(_) => return FilterVerdict::Reject(Predicate::Age),
                Err(e) => return FilterVerdict::Error(Predicate::Age, e),
            }
        }

        if let Some(max_pct) = criteria.top_holders_threshold {
            match data.top_holders_pct(mint, self.top_n).await {
                Ok(pct) if pct <= max_pct => {}
                Ok(_) => return FilterVerdict::Reject(Predicate::TopHolders),
                Err(e) => return FilterVerdict::Error(Predicate::TopHolders, e),
            }
        }

        FilterVerdict::Pass
    }
}
