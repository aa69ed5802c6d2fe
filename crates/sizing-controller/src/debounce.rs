//! Transition debouncer — per-cluster state machine.
//!
//! ```text
//!            observed != current                 elapsed >= delay
//!   Stable ───────────────────────► Pending ─────────────────────► Ready
//!     ▲                               │  │                           │
//!     │      observed == current      │  │ new target: restart clock │ admitted
//!     └───────────────────────────────┘  └──► Pending                ▼
//!                                                                 commit
//! ```
//!
//! A Ready cluster that the limiter defers stays Ready; its clock is not
//! restarted. The delay depends only on the node-count direction of the
//! move, not on how many classes it skips.

use std::time::Duration;

use tracing::debug;

use sizing_core::{ClusterSizingState, Direction, SizingPolicy, Timestamp, duration_millis};

/// Result of feeding one classification into a cluster's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebounceOutcome {
    /// Observed size equals the committed size.
    Stable,
    /// The cluster returned to its committed size before the delay elapsed.
    Cancelled { target: String },
    /// Divergence seen, delay not yet elapsed.
    Pending {
        target: String,
        direction: Direction,
        since: Timestamp,
        remaining: Duration,
    },
    /// Divergence persisted for the full delay; a transition candidate.
    Ready {
        target: String,
        direction: Direction,
        since: Timestamp,
    },
    /// The committed size is absent or unknown to the active partition;
    /// the cluster takes `to` without debounce once committed.
    Reclassify { from: Option<String>, to: String },
}

/// Applies the active policy's partition and delays to cluster states.
pub struct Debouncer<'a> {
    policy: &'a SizingPolicy,
}

impl<'a> Debouncer<'a> {
    pub fn new(policy: &'a SizingPolicy) -> Self {
        Self { policy }
    }

    /// Classify `node_count` and feed the result into `state`.
    pub fn observe(
        &self,
        state: &mut ClusterSizingState,
        node_count: u32,
        now: Timestamp,
    ) -> DebounceOutcome {
        let observed = &self.policy.partition.classify(node_count).name;
        self.observe_size(state, observed, now)
    }

    /// Feed an already-classified size into `state`.
    pub fn observe_size(
        &self,
        state: &mut ClusterSizingState,
        observed: &str,
        now: Timestamp,
    ) -> DebounceOutcome {
        let current = match state.current_size.as_deref() {
            Some(current) if self.policy.partition.contains(current) => current.to_string(),
            previous => {
                let from = previous.map(str::to_string);
                state.observed_size = Some(observed.to_string());
                state.pending_since = None;
                return DebounceOutcome::Reclassify {
                    from,
                    to: observed.to_string(),
                };
            }
        };

        if observed == current {
            let cancelled = state
                .pending_since
                .take()
                .and(state.observed_size.clone())
                .filter(|target| *target != current);
            if state.observed_size.as_deref() != Some(observed) {
                state.observed_size = Some(current);
            }
            return match cancelled {
                Some(target) => DebounceOutcome::Cancelled { target },
                None => DebounceOutcome::Stable,
            };
        }

        // A new target restarts the clock; the same target keeps it.
        let since = match state.pending_since {
            Some(since) if state.observed_size.as_deref() == Some(observed) => since,
            _ => {
                state.observed_size = Some(observed.to_string());
                state.pending_since = Some(now);
                now
            }
        };

        let direction = self
            .policy
            .direction(&current, observed)
            .unwrap_or(Direction::Decrease);
        let delay = self.policy.delays.for_direction(direction);
        let elapsed = now.saturating_sub(since);

        if elapsed >= duration_millis(delay) {
            DebounceOutcome::Ready {
                target: observed.to_string(),
                direction,
                since,
            }
        } else {
            let remaining = delay.saturating_sub(Duration::from_millis(elapsed));
            debug!(
                from = %current,
                to = %observed,
                ?direction,
                remaining_ms = remaining.as_millis() as u64,
                "size transition pending"
            );
            DebounceOutcome::Pending {
                target: observed.to_string(),
                direction,
                since,
                remaining,
            }
        }
    }

    /// Make the observed size the committed size. Returns the new size.
    pub fn commit(state: &mut ClusterSizingState) -> Option<String> {
        state.pending_since = None;
        if state.observed_size.is_some() {
            state.current_size = state.observed_size.clone();
        }
        state.current_size.clone()
    }
}
