//! Persisted record types.

use serde::{Deserialize, Serialize};

use sizing_core::{ClusterId, ClusterSizingState, SizeAssignment, Timestamp, TransitionRecord};

/// Everything the store keeps about one managed cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub cluster_id: ClusterId,
    pub state: ClusterSizingState,
    /// Last committed assignment with its resolved effects.
    pub assignment: Option<SizeAssignment>,
    /// Node count seen in the most recent successful fetch.
    pub last_node_count: Option<u32>,
    pub updated_at: Timestamp,
}

impl ClusterRecord {
    pub fn new(cluster_id: &str, updated_at: Timestamp) -> Self {
        Self {
            cluster_id: cluster_id.to_string(),
            state: ClusterSizingState::default(),
            assignment: None,
            last_node_count: None,
            updated_at,
        }
    }
}

/// Build the ledger table key for a transition record.
pub fn ledger_key(record: &TransitionRecord) -> String {
    format!("{:020}:{}", record.committed_at, record.cluster_id)
}
