//! Collaborator ports
//!
//! Narrow contracts for everything outside the detection core: the purchase
//! pipeline, the settings store and the user notification channel.

use async_trait::async_trait;

use super::PortError;
use crate::domain::{TokenCandidate, UserCriteria, UserId};

/// Purchase collaborator
///
/// Invoked exactly once per matched (user, token) pair and never retried by
/// the core. `Ok(false)` means the attempt ran but did not fill.
#[async_trait]
pub trait PurchasePort: Send + Sync {
    async fn attempt_purchase(
        &self,
        user: UserId,
        candidate: &TokenCandidate,
    ) -> Result<bool, PortError>;
}

/// Read-only settings store
#[async_trait]
pub trait SettingsPort: Send + Sync {
    async fn get_user_criteria(&self, user: UserId) -> Result<UserCriteria, PortError>;
}

/// Fire-and-forget notification sink; failures are logged by the caller
#[async_trait]
pub trait NotifierPort: Send + Sync {
    async fn notify(&self, user: UserId, message: &str) -> Result<(), PortError>;
}
