//! Domain Layer - Core detection logic
//!
//! Pure types and rules with no I/O of their own. Token data reaches the filter
//! through the `TokenDataSource` port.
//!
//! - `candidate`: discovered mints and derived snapshots
//! - `criteria`: per-user acceptance criteria
//! - `filter`: predicate composition, fail-closed evaluation
//! - `processed`: bounded record of mints already evaluated
//! - `watchers`: armed users and their match lifecycle

pub mod candidate;
pub mod criteria;
pub mod filter;
pub mod processed;
pub mod watchers;

pub use candidate::{CandidateOrigin, FeedFields, TokenCandidate, TokenSnapshot};
pub use criteria::{AuthorityRequirement, CriteriaError, UserCriteria, UserId};
pub use filter::{holder_concentration_pct, FilterEvaluator, FilterVerdict, Predicate, DEFAULT_TOP_HOLDERS};
pub use processed::{ProcessedRecord, DEFAULT_PROCESSED_CAPACITY};
pub use watchers::{WatchState, WatcherSet};
