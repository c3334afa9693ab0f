//! Collaborator Adapters
//!
//! Concrete implementations of the collaborator ports for the standalone
//! binary: settings from the config file, notifications to the log or a
//! webhook, and a purchaser that only records what it would have bought.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

use crate::domain::{TokenCandidate, UserCriteria, UserId};
use crate::ports::{NotifierPort, PortError, PurchasePort, SettingsPort};

/// Settings store backed by the `[[users]]` table
#[derive(Debug, Clone, Default)]
pub struct StaticSettings {
    users: HashMap<UserId, UserCriteria>,
}

impl StaticSettings {
    pub fn new(users: impl IntoIterator<Item = (UserId, UserCriteria)>) -> Self {
        Self {
            users: users.into_iter().collect(),
        }
    }

    pub fn user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.users.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl SettingsPort for StaticSettings {
    async fn get_user_criteria(&self, user: UserId) -> Result<UserCriteria, PortError> {
        self.users
            .get(&user)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("no criteria for user {}", user)))
    }
}

/// Writes notifications to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotifierPort for LogNotifier {
    async fn notify(&self, user: UserId, message: &str) -> Result<(), PortError> {
        info!(user, "{}", message);
        Ok(())
    }
}

/// Posts notifications to a Discord-compatible webhook
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    http: Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, PortError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Unavailable(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { url: url.into(), http })
    }

    /// Webhook request body
    pub fn payload(user: UserId, message: &str) -> serde_json::Value {
        json!({ "content": format!("[user {}] {}", user, message) })
    }
}

#[async_trait]
impl NotifierPort for WebhookNotifier {
    async fn notify(&self, user: UserId, message: &str) -> Result<(), PortError> {
        let response = self
            .http
            .post(&self.url)
            .json(&Self::payload(user, message))
            .send()
            .await
            .map_err(|e| PortError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PortError::Failed(format!("webhook returned {}", response.status())));
        }
        Ok(())
    }
}

/// Logs the purchase it would make and reports it as attempted
#[derive(Debug, Default)]
pub struct DryRunPurchaser {
    attempts: AtomicU64,
}

impl DryRunPurchaser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PurchasePort for DryRunPurchaser {
    async fn attempt_purchase(&self, user: UserId, candidate: &TokenCandidate) -> Result<bool, PortError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        warn!(
            user,
            mint = %candidate.mint,
            origin = %candidate.origin,
            "[DRY RUN] Purchase not executed"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CandidateOrigin;

    #[tokio::test]
    async fn test_static_settings_lookup() {
        let settings = StaticSettings::new(vec![
            (7, UserCriteria::unconstrained().with_liquidity_threshold(5_000.0)),
            (3, UserCriteria::unconstrained()),
        ]);

        assert_eq!(settings.user_ids(), vec![3, 7]);
        let criteria = settings.get_user_criteria(7).await.unwrap();
        assert_eq!(criteria.liquidity_threshold, Some(5_000.0));
        assert!(matches!(settings.get_user_criteria(99).await, Err(PortError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_dry_run_purchaser_counts() {
        let purchaser = DryRunPurchaser::new();
        let candidate = TokenCandidate::new("MintA", CandidateOrigin::Manual);

        assert_eq!(purchaser.attempt_purchase(1, &candidate).await, Ok(true));
        assert_eq!(purchaser.attempts(), 1);
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        assert!(LogNotifier.notify(1, "hello").await.is_ok());
    }

    #[test]
    fn test_webhook_payload() {
        let payload = WebhookNotifier::payload(5, "matched WIF");
        assert_eq!(payload["content"], "[user 5] matched WIF");
    }
}
