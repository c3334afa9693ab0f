//! Watcher Set
//!
//! Users currently armed to receive the next matching token.
//!
//! Per-user lifecycle: `Armed -> Matched -> Retired`. A retired user is simply
//! absent from the set. `claim` is the only way into `Matched`, and it succeeds
//! at most once per arming, which is what makes purchases exactly-once.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::criteria::UserId;

/// State of a user present in the set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchState {
    /// Waiting for a matching candidate
    Armed,
    /// Matched; purchase attempt in progress
    Matched,
}

/// Ordered set of watchers, unique by user id
#[derive(Debug, Default)]
pub struct WatcherSet {
    /// Arming order; evaluation follows it
    order: Vec<UserId>,
    states: HashMap<UserId, WatchState>,
}

impl WatcherSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a user. Returns `false` if the user is already present.
    pub fn arm(&mut self, user: UserId) -> bool {
        if self.states.contains_key(&user) {
            return false;
        }
        self.order.push(user);
        self.states.insert(user, WatchState::Armed);
        true
    }

    /// Remove a user regardless of state. Returns `false` if absent.
    pub fn disarm(&mut self, user: UserId) -> bool {
        self.remove(user)
    }

    /// `Armed -> Matched`. Fails if the user is not currently armed.
    pub fn claim(&mut self, user: UserId) -> bool {
        match self.states.get_mut(&user) {
            Some(state) if *state == WatchState::Armed => {
                *state = WatchState::Matched;
                true
            }
            _ => false,
        }
    }

    /// `Matched -> Retired`. Returns `false` if the user was not matched.
    pub fn retire(&mut self, user: UserId) -> bool {
        match self.states.get(&user) {
            Some(WatchState::Matched) => self.remove(user),
            _ => false,
        }
    }

    /// Armed users in arming order
    pub fn snapshot(&self) -> Vec<UserId> {
        self.order
            .iter()
            .copied()
            .filter(|u| self.states.get(u) == Some(&WatchState::Armed))
            .collect()
    }

    pub fn state(&self, user: UserId) -> Option<WatchState> {
        self.states.get(&user).copied()
    }

    pub fn is_armed(&self, user: UserId) -> bool {
        self.state(user) == Some(WatchState::Armed)
    }

    /// Users present in any state
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.states.clear();
    }

    fn remove(&mut self, user: UserId) -> bool {
        if self.states.remove(&user).is_none() {
            return false;
        }
        self.order.retain(|u| *u != user);
        true
    }
}
