use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::quantity::Quantity;

/// Identifier of a managed cluster.
pub type ClusterId = String;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Resolved effects of belonging to a size class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effects {
    /// Memory request for the Kube APIServer pod.
    pub kas_memory_request: Option<Quantity>,
    /// `$GOMEMLIMIT` for the Kube APIServer container.
    pub kas_go_mem_limit: Option<Quantity>,
    /// Priority class for most control plane pods.
    pub control_plane_priority_class_name: Option<String>,
    /// Priority class for etcd pods.
    pub etcd_priority_class_name: Option<String>,
    /// Priority class for pods in the API request serving path.
    pub api_critical_priority_class_name: Option<String>,
}

impl Effects {
    pub fn is_empty(&self) -> bool {
        self == &Effects::default()
    }
}

/// The committed size of a cluster, as handed to effect renderers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeAssignment {
    pub cluster_id: ClusterId,
    pub size: String,
    pub effects: Effects,
    pub assigned_at: Timestamp,
}

/// Per-cluster debounce state.
///
/// `current_size` is the committed assignment (`None` until the first
/// classification); `observed_size` the latest raw classification;
/// `pending_since` the first time the current divergence was seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSizingState {
    pub current_size: Option<String>,
    pub observed_size: Option<String>,
    pub pending_since: Option<Timestamp>,
}

impl ClusterSizingState {
    /// A cluster already settled at `size`.
    pub fn settled(size: &str) -> Self {
        Self {
            current_size: Some(size.to_string()),
            observed_size: Some(size.to_string()),
            pending_since: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }
}

/// A committed transition, as recorded in the fleet ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub cluster_id: ClusterId,
    pub committed_at: Timestamp,
}

/// Current wall-clock time as a `Timestamp`.
pub fn epoch_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as Timestamp
}

/// Convert a duration into timestamp units, saturating.
pub fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
