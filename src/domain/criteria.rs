//! User Acceptance Criteria
//!
//! Per-user filter configuration. Every field is optional; `None` means the
//! corresponding predicate is skipped.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a bot user (chat id)
pub type UserId = i64;

/// Tri-state requirement on an on-chain authority.
///
/// Wrapped in `Option`, where `None` is "don't care".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorityRequirement {
    /// Authority must still be present
    Required,
    /// Authority must be revoked
    Forbidden,
}

impl AuthorityRequirement {
    /// Check an observed authority flag against the requirement
    pub fn is_satisfied_by(&self, present: bool) -> bool {
        match self {
            AuthorityRequirement::Required => present,
            AuthorityRequirement::Forbidden => !present,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CriteriaError {
    #[error("{field} must be >= 0, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} must be within 0-100, got {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

/// Snapshot of one user's acceptance criteria
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserCriteria {
    /// Minimum pool liquidity in USD
    #[serde(default)]
    pub liquidity_threshold: Option<f64>,
    /// Mint authority requirement
    #[serde(default)]
    pub require_mint_authority: Option<AuthorityRequirement>,
    /// Freeze authority requirement
    #[serde(default)]
    pub require_freeze_authority: Option<AuthorityRequirement>,
    /// Maximum percentage of supply held by the top holders
    #[serde(default)]
    pub top_holders_threshold: Option<f64>,
    /// Minimum boost amount reported by the boost feed
    #[serde(default)]
    pub min_boost_amount: Option<f64>,
    /// Minimum creation market cap (SOL) reported by the subscription feed
    #[serde(default)]
    pub min_market_cap_sol: Option<f64>,
    /// Maximum age of the earliest pool in seconds
    #[serde(default)]
    pub max_age_secs: Option<i64>,
}

impl UserCriteria {
    /// Criteria with no constraints: every candidate passes
    pub fn unconstrained() -> Self {
        Self::default()
    }

    pub fn with_liquidity_threshold(mut self, usd: f64) -> Self {
        self.liquidity_threshold = Some(usd);
        self
    }

    pub fn with_mint_authority(mut self, requirement: AuthorityRequirement) -> Self {
        self.require_mint_authority = Some(requirement);
        self
    }

    pub fn with_freeze_authority(mut self, requirement: AuthorityRequirement) -> Self {
        self.require_freeze_authority = Some(requirement);
        self
    }

    pub fn with_top_holders_threshold(mut self, pct: f64) -> Self {
        self.top_holders_threshold = Some(pct);
        self
    }

    pub fn with_min_boost_amount(mut self, amount: f64) -> Self {
        self.min_boost_amount = Some(amount);
        self
    }

    pub fn with_min_market_cap_sol(mut self, sol: f64) -> Self {
        self.min_market_cap_sol = Some(sol);
        self
    }

    pub fn with_max_age_secs(mut self, secs: i64) -> Self {
        self.max_age_secs = Some(secs);
        self
    }

    /// Reject values no filter could meaningfully use
    pub fn validate(&self) -> Result<(), CriteriaError> {
        let non_negative = [
            ("liquidity_threshold", self.liquidity_threshold),
            ("min_boost_amount", self.min_boost_amount),
            ("min_market_cap_sol", self.min_market_cap_sol),
            ("max_age_secs", self.max_age_secs.map(|s| s as f64)),
        ];
        for (field, value) in non_negative {
            if let Some(value) = value {
                if value < 0.0 || value.is_nan() {
                    return Err(CriteriaError::Negative { field, value });
                }
            }
        }

        if let Some(pct) = self.top_holders_threshold {
            if !(0.0..=100.0).contains(&pct) {
                return Err(CriteriaError::OutOfRange {
                    field: "top_holders_threshold",
                    value: pct,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authority_requirement() {
        assert!(AuthorityRequirement::Required.is_satisfied_by(true));
        assert!(!AuthorityRequirement::Required.is_satisfied_by(false));
        assert!(AuthorityRequirement::Forbidden.is_satisfied_by(false));
        assert!(!AuthorityRequirement::Forbidden.is_satisfied_by(true));
    }

    #[test]
    fn test_validate_rejects_negative_liquidity() {
        let criteria = UserCriteria::unconstrained().with_liquidity_threshold(-1.0);
        assert!(matches!(
            criteria.validate(),
            Err(CriteriaError::Negative { field: "liquidity_threshold", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_concentration_over_100() {
        let criteria = UserCriteria::unconstrained().with_top_holders_threshold(150.0);
        assert!(matches!(criteria.validate(), Err(CriteriaError::OutOfRange { .. })));
    }

    #[test]
    fn test_deserialize_from_toml() {
        let criteria: UserCriteria = toml::from_str(
            r#"
liquidity_threshold = 5000.0
require_mint_authority = "forbidden"
top_holders_threshold = 30.0
"#,
        )
        .unwrap();

        assert_eq!(criteria.liquidity_threshold, Some(5000.0));
        assert_eq!(criteria.require_mint_authority, Some(AuthorityRequirement::Forbidden));
        assert_eq!(criteria.require_freeze_authority, None);
        assert!(criteria.validate().is_ok());
    }
}
