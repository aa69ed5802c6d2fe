//! sizing-core — configuration, validation, and classification for
//! cluster size classes.
//!
//! A `ClusterSizingConfiguration` is parsed from TOML or JSON, then
//! validated into a `SizingPolicy`: a `SizePartition` covering every
//! node count in `[0, u32::MAX]` plus the concurrency and transition delay
//! settings used by the controller.

pub mod condition;
pub mod config;
pub mod duration;
pub mod error;
pub mod partition;
pub mod policy;
pub mod quantity;
pub mod types;

pub use condition::{Condition, ConditionStatus, CONFIGURATION_VALID};
pub use config::ClusterSizingConfiguration;
pub use error::{ConfigError, ConfigResult};
pub use partition::{SizeClass, SizePartition};
pub use policy::{ConcurrencyPolicy, Direction, SizingPolicy, TransitionDelays};
pub use quantity::Quantity;
pub use types::*;
