//! Processed-token record
//!
//! Remembers which mints the detection loop has already evaluated so a token
//! seen again in a later feed snapshot is not re-alerted. Bounded: the oldest
//! mint is forgotten first.

use std::collections::{HashSet, VecDeque};

/// Default number of mints remembered
pub const DEFAULT_PROCESSED_CAPACITY: usize = 10_000;

#[derive(Debug)]
pub struct ProcessedRecord {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl Default for ProcessedRecord {
    fn default() -> Self {
        Self::new(DEFAULT_PROCESSED_CAPACITY)
    }
}

impl ProcessedRecord {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// Record a mint. Returns `false` if it was already present.
    pub fn insert(&mut self, mint: &str) -> bool {
        if self.seen.contains(mint) {
            return false;
        }

        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }

        self.order.push_back(mint.to_string());
        self.seen.insert(mint.to_string());
        true
    }

    pub fn contains(&self, mint: &str) -> bool {
        self.seen.contains(mint)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }
}
