//! Validated sizing policy.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::config::{CONFIGURATION_NAME, ClusterSizingConfiguration, EffectsConfiguration};
use crate::duration::parse_duration;
use crate::error::{ConfigError, ConfigResult};
use crate::partition::{SizeClass, SizePartition};
use crate::quantity::Quantity;
use crate::types::Effects;

/// Node-count direction of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increase,
    Decrease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConcurrencyPolicy {
    pub sliding_window: Duration,
    pub limit: u32,
}

impl Default for ConcurrencyPolicy {
    fn default() -> Self {
        Self {
            sliding_window: Duration::from_secs(600),
            limit: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransitionDelays {
    pub increase: Duration,
    pub decrease: Duration,
}

impl Default for TransitionDelays {
    fn default() -> Self {
        Self {
            increase: Duration::from_secs(30),
            decrease: Duration::from_secs(600),
        }
    }
}

impl TransitionDelays {
    pub fn for_direction(&self, direction: Direction) -> Duration {
        match direction {
            Direction::Increase => self.increase,
            Direction::Decrease => self.decrease,
        }
    }
}

/// A configuration that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizingPolicy {
    pub partition: SizePartition,
    pub concurrency: ConcurrencyPolicy,
    pub delays: TransitionDelays,
}

impl SizingPolicy {
    pub fn from_config(config: &ClusterSizingConfiguration) -> ConfigResult<Self> {
        if config.name != CONFIGURATION_NAME {
            return Err(ConfigError::InvalidName(config.name.clone()));
        }

        let classes = config
            .sizes
            .iter()
            .map(|size| {
                Ok(SizeClass {
                    name: size.name.clone(),
                    from: size.criteria.from,
                    to: size.criteria.to,
                    effects: resolve_effects(&size.name, size.effects.as_ref())?,
                })
            })
            .collect::<ConfigResult<Vec<_>>>()?;
        let partition = SizePartition::new(classes)?;

        let sliding_window = parse_duration(&config.concurrency.sliding_window).map_err(|source| {
            ConfigError::InvalidDuration {
                field: "concurrency.slidingWindow",
                source,
            }
        })?;
        let limit = u32::try_from(config.concurrency.limit)
            .ok()
            .filter(|l| *l >= 1)
            .ok_or(ConfigError::InvalidLimit(config.concurrency.limit))?;

        let increase = parse_duration(&config.transition_delay.increase).map_err(|source| {
            ConfigError::InvalidDuration {
                field: "transitionDelay.increase",
                source,
            }
        })?;
        let decrease = parse_duration(&config.transition_delay.decrease).map_err(|source| {
            ConfigError::InvalidDuration {
                field: "transitionDelay.decrease",
                source,
            }
        })?;

        debug!(
            sizes = partition.len(),
            limit,
            window = ?sliding_window,
            ?increase,
            ?decrease,
            "sizing configuration validated"
        );

        Ok(Self {
            partition,
            concurrency: ConcurrencyPolicy {
                sliding_window,
                limit,
            },
            delays: TransitionDelays { increase, decrease },
        })
    }

    /// Direction of a move from `current` to `target`, judged by lower
    /// bounds. `None` if either class is unknown.
    pub fn direction(&self, current: &str, target: &str) -> Option<Direction> {
        let current = self.partition.lower_bound(current)?;
        let target = self.partition.lower_bound(target)?;
        Some(if target > current {
            Direction::Increase
        } else {
            Direction::Decrease
        })
    }
}

fn resolve_effects(size: &str, effects: Option<&EffectsConfiguration>) -> ConfigResult<Effects> {
    let Some(effects) = effects else {
        return Ok(Effects::default());
    };
    let quantity = |field: &'static str, value: &Option<String>| {
        value
            .as_deref()
            .map(Quantity::parse)
            .transpose()
            .map_err(|source| ConfigError::InvalidQuantity {
                size: size.to_string(),
                field,
                source,
            })
    };

    Ok(Effects {
        kas_memory_request: quantity("kasMemoryRequest", &effects.kas_memory_request)?,
        kas_go_mem_limit: quantity("kasGoMemLimit", &effects.kas_go_mem_limit)?,
        control_plane_priority_class_name: effects.control_plane_priority_class_name.clone(),
        etcd_priority_class_name: effects.etcd_priority_class_name.clone(),
        api_critical_priority_class_name: effects.api_critical_priority_class_name.clone(),
    })
}
