//! Fleet transition limiter — exact sliding-window counter.
//!
//! Bounds the number of committed size transitions across the fleet within
//! any trailing `sliding_window` to `limit`. Every admission is recorded in
//! an in-memory ledger; an entry counts while
//! `committed_at > now - sliding_window`. Expired entries are trimmed
//! lazily from the front of the ledger.

use std::collections::VecDeque;
use std::time::Duration;

use tracing::debug;

use sizing_core::{ConcurrencyPolicy, Timestamp, TransitionRecord, duration_millis};

#[derive(Debug, Clone)]
pub struct FleetTransitionLimiter {
    policy: ConcurrencyPolicy,
    ledger: VecDeque<TransitionRecord>,
}

impl FleetTransitionLimiter {
    pub fn new(policy: ConcurrencyPolicy) -> Self {
        Self {
            policy,
            ledger: VecDeque::new(),
        }
    }

    /// Replace the window and limit. The ledger is kept.
    pub fn reconfigure(&mut self, policy: ConcurrencyPolicy) {
        if self.policy != policy {
            debug!(
                limit = policy.limit,
                window = ?policy.sliding_window,
                "transition limiter reconfigured"
            );
            self.policy = policy;
        }
    }

    pub fn policy(&self) -> ConcurrencyPolicy {
        self.policy
    }

    /// Admit a transition for `cluster_id` at `now` if the window has room.
    /// Only an admission touches the ledger.
    pub fn admit(&mut self, cluster_id: &str, now: Timestamp) -> bool {
        self.prune(now);
        if self.in_window(now) >= self.policy.limit as usize {
            return false;
        }
        self.ledger.push_back(TransitionRecord {
            cluster_id: cluster_id.to_string(),
            committed_at: now,
        });
        true
    }

    /// Number of ledger entries inside the window ending at `now`.
    pub fn in_window(&self, now: Timestamp) -> usize {
        let cutoff = self.cutoff(now);
        self.ledger
            .iter()
            .filter(|r| is_live(r, cutoff))
            .count()
    }

    /// Free slots in the window ending at `now`.
    pub fn remaining(&self, now: Timestamp) -> u32 {
        let used = u32::try_from(self.in_window(now)).unwrap_or(u32::MAX);
        self.policy.limit.saturating_sub(used)
    }

    /// Time until the oldest live entry expires, freeing a slot. `None` if a
    /// slot is free already.
    pub fn next_slot_in(&self, now: Timestamp) -> Option<Duration> {
        if self.remaining(now) > 0 {
            return None;
        }
        let cutoff = self.cutoff(now);
        let oldest = self
            .ledger
            .iter()
            .filter(|r| is_live(r, cutoff))
            .map(|r| r.committed_at)
            .min()?;
        let expires_at = oldest.saturating_add(duration_millis(self.policy.sliding_window));
        Some(Duration::from_millis(expires_at.saturating_sub(now)))
    }

    /// Drop expired entries from the front of the ledger.
    pub fn prune(&mut self, now: Timestamp) -> usize {
        let cutoff = self.cutoff(now);
        let mut pruned = 0;
        while self.ledger.front().is_some_and(|r| !is_live(r, cutoff)) {
            self.ledger.pop_front();
            pruned += 1;
        }
        pruned
    }

    /// Oldest timestamp that is no longer inside the window, if any.
    pub fn cutoff(&self, now: Timestamp) -> Option<Timestamp> {
        now.checked_sub(duration_millis(self.policy.sliding_window))
    }

    pub fn records(&self) -> impl Iterator<Item = &TransitionRecord> {
        self.ledger.iter()
    }

    pub fn last_record(&self) -> Option<&TransitionRecord> {
        self.ledger.back()
    }

    /// Give back the slot taken by `record` when its transition could not be
    /// carried out. Returns false if the record is not in the ledger.
    pub fn release(&mut self, record: &TransitionRecord) -> bool {
        match self.ledger.iter().rposition(|r| r == record) {
            Some(index) => {
                self.ledger.remove(index);
                true
            }
            None => false,
        }
    }

    /// Replace the ledger with previously persisted records.
    pub fn restore(&mut self, mut records: Vec<TransitionRecord>) {
        records.sort_by_key(|r| r.committed_at);
        self.ledger = records.into();
    }
}

fn is_live(record: &TransitionRecord, cutoff: Option<Timestamp>) -> bool {
    cutoff.is_none_or(|cutoff| record.committed_at > cutoff)
}
