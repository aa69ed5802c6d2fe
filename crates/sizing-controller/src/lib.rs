//! sizing-controller — assigns size classes to managed clusters.
//!
//! Each evaluation cycle classifies every cluster's node count, debounces
//! the result per cluster, and commits the clusters whose new size has
//! persisted long enough, subject to a fleet-wide sliding-window bound on
//! the number of transitions.
//!
//! # Cycle
//!
//! ```text
//! node counts ──► classify ──► debounce (per cluster)
//!                                   │ Ready candidates
//!                                   ▼
//!                sort by (pending_since, cluster_id)
//!                                   │
//!                                   ▼
//!                limiter.admit ──► apply effects ──► commit
//!                     │ deferred
//!                     └──────────► retried next cycle
//! ```
//!
//! # Components
//!
//! - **`debounce`** — per-cluster transition state machine
//! - **`limiter`** — fleet transition limiter (exact sliding window)
//! - **`controller`** — the reconciliation cycle and its run loop
//! - **`source`** / **`effects`** — collaborator traits

pub mod controller;
pub mod debounce;
pub mod effects;
pub mod error;
pub mod limiter;
pub mod source;

pub use controller::{ConfigUpdate, CycleReport, SizingController, Transition};
pub use debounce::{DebounceOutcome, Debouncer};
pub use effects::{EffectsApplier, LogOnlyEffectsApplier};
pub use error::{ControllerError, ControllerResult};
pub use limiter::FleetTransitionLimiter;
pub use source::{NodeCountSource, StaticNodeCounts};
