//! Status conditions reported for the sizing configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::Timestamp;

/// Condition type reporting whether the active configuration is usable.
pub const CONFIGURATION_VALID: &str = "ClusterSizingConfigurationValid";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    pub observed_generation: u64,
    pub last_transition_time: Timestamp,
}

impl Condition {
    /// Condition describing the outcome of validating a configuration.
    pub fn configuration_valid(
        result: Result<(), &ConfigError>,
        generation: u64,
        now: Timestamp,
    ) -> Self {
        let (status, reason, message) = match result {
            Ok(()) => (
                ConditionStatus::True,
                "AsExpected".to_string(),
                "Configuration is valid.".to_string(),
            ),
            Err(e) => (ConditionStatus::False, e.reason().to_string(), e.to_string()),
        };
        Self {
            type_: CONFIGURATION_VALID.to_string(),
            status,
            reason,
            message,
            observed_generation: generation,
            last_transition_time: now,
        }
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

/// Insert or update `condition` in `conditions`, keyed by type.
///
/// The existing `last_transition_time` is kept unless the status changes.
/// Returns true if anything changed.
pub fn set_condition(conditions: &mut Vec<Condition>, condition: Condition) -> bool {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        None => {
            conditions.push(condition);
            true
        }
        Some(existing) => {
            let mut changed = false;
            if existing.status != condition.status {
                existing.status = condition.status;
                existing.last_transition_time = condition.last_transition_time;
                changed = true;
            }
            if existing.reason != condition.reason {
                existing.reason = condition.reason;
                changed = true;
            }
            if existing.message != condition.message {
                existing.message = condition.message;
                changed = true;
            }
            if existing.observed_generation != condition.observed_generation {
                existing.observed_generation = condition.observed_generation;
                changed = true;
            }
            changed
        }
    }
}

/// Find a condition by type.
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}
