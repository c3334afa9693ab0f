//! Recording mocks for the port traits
//!
//! Deterministic stand-ins used by unit and integration tests. Each mock
//! records its calls and returns canned responses.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{
    CandidateSource, CandidateSourceFactory, MintAuthorities, NotifierPort, PortError,
    ProviderError, PurchasePort, SettingsPort, TokenDataSource,
};
use crate::domain::{TokenCandidate, UserCriteria, UserId};

/// Mock purchase collaborator that records every attempt
#[derive(Debug, Default, Clone)]
pub struct MockPurchaser {
    calls: Arc<Mutex<Vec<(UserId, String)>>>,
    outcomes: Arc<Mutex<HashMap<UserId, Result<bool, PortError>>>>,
}

impl MockPurchaser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the outcome for a given user (default: `Ok(true)`)
    pub fn with_outcome(self, user: UserId, outcome: Result<bool, PortError>) -> Self {
        self.outcomes.lock().unwrap().insert(user, outcome);
        self
    }

    /// Get all recorded (user, mint) attempts
    pub fn get_calls(&self) -> Vec<(UserId, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PurchasePort for MockPurchaser {
    async fn attempt_purchase(
        &self,
        user: UserId,
        candidate: &TokenCandidate,
    ) -> Result<bool, PortError> {
        self.calls.lock().unwrap().push((user, candidate.mint.clone()));
        self.outcomes
            .lock()
            .unwrap()
            .get(&user)
            .cloned()
            .unwrap_or(Ok(true))
    }
}

/// Mock notifier that records messages per user
#[derive(Debug, Default, Clone)]
pub struct MockNotifier {
    messages: Arc<Mutex<Vec<(UserId, String)>>>,
    fail: bool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifier whose every send fails (after recording)
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn get_messages(&self) -> Vec<(UserId, String)> {
        self.messages.lock().unwrap().clone()
    }

    /// Yield until at least `count` messages arrived; sends run on detached tasks
    pub async fn wait_for(&self, count: usize) -> Vec<(UserId, String)> {
        for _ in 0..1_000 {
            if self.messages.lock().unwrap().len() >= count {
                break;
            }
            tokio::task::yield_now().await;
        }
        self.get_messages()
    }

    pub fn messages_for(&self, user: UserId) -> Vec<String> {
        self.get_messages()
            .into_iter()
            .filter(|(u, _)| *u == user)
            .map(|(_, m)| m)
            .collect()
    }
}

#[async_trait]
impl NotifierPort for MockNotifier {
    async fn notify(&self, user: UserId, message: &str) -> Result<(), PortError> {
        self.messages.lock().unwrap().push((user, message.to_string()));
        if self.fail {
            return Err(PortError::Unavailable("mock notifier down".into()));
        }
        Ok(())
    }
}

/// Mock settings store backed by a map
#[derive(Debug, Default, Clone)]
pub struct MockSettings {
    criteria: Arc<Mutex<HashMap<UserId, UserCriteria>>>,
}

impl MockSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_criteria(self, user: UserId, criteria: UserCriteria) -> Self {
        self.criteria.lock().unwrap().insert(user, criteria);
        self
    }
}

#[async_trait]
impl SettingsPort for MockSettings {
    async fn get_user_criteria(&self, user: UserId) -> Result<UserCriteria, PortError> {
        self.criteria
            .lock()
            .unwrap()
            .get(&user)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("no criteria for user {}", user)))
    }
}

/// Canned token attributes; a `None` field makes that accessor fail
#[derive(Debug, Clone)]
pub struct MockTokenProfile {
    pub liquidity_usd: Option<f64>,
    pub authorities: Option<MintAuthorities>,
    pub top_holders_pct: Option<f64>,
    pub age_secs: Option<Option<i64>>,
}

impl Default for MockTokenProfile {
    fn default() -> Self {
        Self {
            liquidity_usd: Some(0.0),
            authorities: Some(MintAuthorities::default()),
            top_holders_pct: Some(0.0),
            age_secs: Some(None),
        }
    }
}

/// Mock token data source keyed by mint
#[derive(Debug, Default, Clone)]
pub struct MockTokenData {
    profiles: Arc<Mutex<HashMap<String, MockTokenProfile>>>,
    calls: Arc<AtomicUsize>,
}

impl MockTokenData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(self, mint: &str, profile: MockTokenProfile) -> Self {
        self.profiles.lock().unwrap().insert(mint.to_string(), profile);
        self
    }

    /// Total accessor calls across all mints
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn profile(&self, mint: &str) -> Result<MockTokenProfile, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.profiles
            .lock()
            .unwrap()
            .get(mint)
            .cloned()
            .ok_or_else(|| ProviderError::fatal(format!("unknown mint {}", mint)))
    }
}

#[async_trait]
impl TokenDataSource for MockTokenData {
    async fn liquidity_usd(&self, mint: &str) -> Result<f64, ProviderError> {
        self.profile(mint)?
            .liquidity_usd
            .ok_or_else(|| ProviderError::transient("liquidity unavailable"))
    }

    async fn authorities(&self, mint: &str) -> Result<MintAuthorities, ProviderError> {
        self.profile(mint)?
            .authorities
            .ok_or_else(|| ProviderError::transient("mint account unavailable"))
    }

    async fn top_holders_pct(&self, mint: &str, _top_n: usize) -> Result<f64, ProviderError> {
        self.profile(mint)?
            .top_holders_pct
            .ok_or_else(|| ProviderError::transient("largest accounts unavailable"))
    }

    async fn age_secs(&self, mint: &str) -> Result<Option<i64>, ProviderError> {
        self.profile(mint)?
            .age_secs
            .ok_or_else(|| ProviderError::transient("pairs unavailable"))
    }
}

/// Candidate source that replays a shared script of batches
pub struct ScriptedSource {
    script: Arc<Mutex<VecDeque<Vec<TokenCandidate>>>>,
    delay: Duration,
    hold_open: bool,
}

#[async_trait]
impl CandidateSource for ScriptedSource {
    async fn next_batch(&mut self) -> Option<Vec<TokenCandidate>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(batch) => Some(batch),
            None if self.hold_open => std::future::pending().await,
            None => None,
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Factory handing each created source the remaining shared script
#[derive(Clone, Default)]
pub struct ScriptedSourceFactory {
    script: Arc<Mutex<VecDeque<Vec<TokenCandidate>>>>,
    created: Arc<AtomicUsize>,
    delay: Duration,
    hold_open: bool,
}

impl ScriptedSourceFactory {
    pub fn new(batches: Vec<Vec<TokenCandidate>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(batches.into())),
            ..Self::default()
        }
    }

    /// Wait this long before yielding each batch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Keep the source pending after the script runs out instead of ending it
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Append a batch to the shared script
    pub fn push_batch(&self, batch: Vec<TokenCandidate>) {
        self.script.lock().unwrap().push_back(batch);
    }

    /// How many sources have been built
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl CandidateSourceFactory for ScriptedSourceFactory {
    fn create(&self) -> Box<dyn CandidateSource> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Box::new(ScriptedSource {
            script: Arc::clone(&self.script),
            delay: self.delay,
            hold_open: self.hold_open,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CandidateOrigin;

    #[tokio::test]
    async fn test_mock_purchaser_records_calls() {
        let mock = MockPurchaser::new().with_outcome(2, Ok(false));
        let candidate = TokenCandidate::new("MintA", CandidateOrigin::Manual);

        assert_eq!(mock.attempt_purchase(1, &candidate).await, Ok(true));
        assert_eq!(mock.attempt_purchase(2, &candidate).await, Ok(false));
        assert_eq!(
            mock.get_calls(),
            vec![(1, "MintA".to_string()), (2, "MintA".to_string())]
        );
    }

    #[tokio::test]
    async fn test_mock_settings_missing_user() {
        let mock = MockSettings::new().with_criteria(1, UserCriteria::unconstrained());
        assert!(mock.get_user_criteria(1).await.is_ok());
        assert!(matches!(mock.get_user_criteria(9).await, Err(PortError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_scripted_source_ends_after_script() {
        let factory = ScriptedSourceFactory::new(vec![vec![TokenCandidate::new(
            "MintA",
            CandidateOrigin::Manual,
        )]]);
        let mut source = factory.create();

        assert_eq!(source.next_batch().await.map(|b| b.len()), Some(1));
        assert!(source.next_batch().await.is_none());
        assert_eq!(factory.created_count(), 1);
    }
}
