//! Candidate Sources
//!
//! - `PollingSource` pulls the boosted tokens feed on a fixed interval.
//! - `SubscriptionSource` drains a push channel (the PumpPortal stream).
//!
//! Both are non-restartable; their factories build a fresh one on every arm.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, warn};

use super::providers::ProviderClients;
use super::pump_fun::{PumpPortalConfig, PumpPortalSubscription};
use crate::domain::TokenCandidate;
use crate::ports::{CandidateSource, CandidateSourceFactory, ProviderError};

/// Default poll interval for the boosted feed
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1200);
/// Upper bound on candidates drained into one subscription batch
pub const MAX_SUBSCRIPTION_BATCH: usize = 64;

/// A pullable feed of candidates
#[async_trait]
pub trait CandidateFeed: Send + Sync {
    async fn fetch(&self) -> Result<Vec<TokenCandidate>, ProviderError>;
}

#[async_trait]
impl CandidateFeed for ProviderClients {
    async fn fetch(&self) -> Result<Vec<TokenCandidate>, ProviderError> {
        self.boosted_candidates().await
    }
}

/// Polls a feed once per tick; a failed poll yields an empty batch
pub struct PollingSource {
    feed: Arc<dyn CandidateFeed>,
    interval: Interval,
}

impl PollingSource {
    pub fn new(feed: Arc<dyn CandidateFeed>, period: Duration) -> Self {
        let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { feed, interval }
    }
}

#[async_trait]
impl CandidateSource for PollingSource {
    async fn next_batch(&mut self) -> Option<Vec<TokenCandidate>> {
        self.interval.tick().await;

        match self.feed.fetch().await {
            Ok(batch) => {
                debug!(count = batch.len(), "Polled candidate feed");
                Some(batch)
            }
            Err(e) => {
                warn!(error = %e, "Candidate poll failed");
                Some(Vec::new())
            }
        }
    }

    fn name(&self) -> &'static str {
        "polling"
    }
}

/// Drains a channel into batches; ends when every sender is gone
pub struct SubscriptionSource {
    rx: mpsc::Receiver<TokenCandidate>,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionSource {
    pub fn new(rx: mpsc::Receiver<TokenCandidate>) -> Self {
        Self { rx, task: None }
    }

    /// Tie a producer task's lifetime to this source
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }
}

impl Drop for SubscriptionSource {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl CandidateSource for SubscriptionSource {
    async fn next_batch(&mut self) -> Option<Vec<TokenCandidate>> {
        let first = self.rx.recv().await?;
        let mut batch = vec![first];

        while batch.len() < MAX_SUBSCRIPTION_BATCH {
            match self.rx.try_recv() {
                Ok(candidate) => batch.push(candidate),
                Err(_) => break,
            }
        }

        Some(batch)
    }

    fn name(&self) -> &'static str {
        "subscription"
    }
}

/// Builds polling sources over a shared feed
#[derive(Clone)]
pub struct PollingSourceFactory {
    feed: Arc<dyn CandidateFeed>,
    period: Duration,
}

impl PollingSourceFactory {
    pub fn new(feed: Arc<dyn CandidateFeed>, period: Duration) -> Self {
        Self { feed, period }
    }
}

impl CandidateSourceFactory for PollingSourceFactory {
    fn create(&self) -> Box<dyn CandidateSource> {
        Box::new(PollingSource::new(Arc::clone(&self.feed), self.period))
    }
}

/// Opens a new PumpPortal subscription per source
#[derive(Debug, Clone, Default)]
pub struct PumpPortalSourceFactory {
    config: PumpPortalConfig,
}

impl PumpPortalSourceFactory {
    pub fn new(config: PumpPortalConfig) -> Self {
        Self { config }
    }
}

impl CandidateSourceFactory for PumpPortalSourceFactory {
    /// Must be called from within a Tokio runtime
    fn create(&self) -> Box<dyn CandidateSource> {
        let (task, rx) = PumpPortalSubscription::spawn(self.config.clone());
        Box::new(SubscriptionSource::new(rx).with_task(task))
    }
}
