//! Candidate source port
//!
//! The detection loop only sees a lazy sequence of candidate batches. Whether
//! they come from a push subscription or a timed poll is the adapter's concern.

use async_trait::async_trait;

use crate::domain::TokenCandidate;

/// A non-restartable sequence of candidate batches
#[async_trait]
pub trait CandidateSource: Send {
    /// Wait for the next batch. `None` ends the sequence.
    ///
    /// An empty batch is valid (e.g. a poll that found nothing new).
    async fn next_batch(&mut self) -> Option<Vec<TokenCandidate>>;

    /// Name used in logs
    fn name(&self) -> &'static str;
}

/// Builds a fresh source each time detection is (re)armed
pub trait CandidateSourceFactory: Send + Sync {
    fn create(&self) -> Box<dyn CandidateSource>;
}

impl<F> CandidateSourceFactory for F
where
    F: Fn() -> Box<dyn CandidateSource> + Send + Sync,
{
    fn create(&self) -> Box<dyn CandidateSource> {
        self()
    }
}
