//! Cluster sizing configuration document.
//!
//! Mirrors the declarative `ClusterSizingConfiguration` resource: size
//! classes keyed by node count, the fleet-wide transition concurrency bound,
//! and the per-direction transition delay. Parsing never validates; call
//! [`ClusterSizingConfiguration::validate`] to obtain a `SizingPolicy`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigResult;
use crate::policy::SizingPolicy;

/// The only accepted configuration name.
pub const CONFIGURATION_NAME: &str = "cluster";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSizingConfiguration {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub sizes: Vec<SizeConfiguration>,
    #[serde(default)]
    pub concurrency: ConcurrencyConfiguration,
    #[serde(default)]
    pub transition_delay: TransitionDelayConfiguration,
}

/// One t-shirt size class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeConfiguration {
    pub name: String,
    pub criteria: NodeCountCriteria,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effects: Option<EffectsConfiguration>,
}

/// Inclusive node count range; an absent `to` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCountCriteria {
    pub from: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectsConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kas_memory_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kas_go_mem_limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_priority_class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etcd_priority_class_name: Option<String>,
    #[serde(
        rename = "APICriticalPriorityClassName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub api_critical_priority_class_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcurrencyConfiguration {
    #[serde(default = "default_sliding_window")]
    pub sliding_window: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl Default for ConcurrencyConfiguration {
    fn default() -> Self {
        Self {
            sliding_window: default_sliding_window(),
            limit: default_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionDelayConfiguration {
    #[serde(default = "default_increase")]
    pub increase: String,
    #[serde(default = "default_decrease")]
    pub decrease: String,
}

impl Default for TransitionDelayConfiguration {
    fn default() -> Self {
        Self {
            increase: default_increase(),
            decrease: default_decrease(),
        }
    }
}

fn default_name() -> String {
    CONFIGURATION_NAME.to_string()
}

fn default_sliding_window() -> String {
    "10m".to_string()
}

fn default_limit() -> i64 {
    5
}

fn default_increase() -> String {
    "30s".to_string()
}

fn default_decrease() -> String {
    "10m".to_string()
}

impl ClusterSizingConfiguration {
    /// Read a configuration file. Files ending in `.json` are parsed as
    /// JSON, anything else as TOML.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| crate::ConfigError::Parse(e.to_string()))
    }

    /// Validate the document and resolve it into a `SizingPolicy`.
    pub fn validate(&self) -> ConfigResult<SizingPolicy> {
        SizingPolicy::from_config(self)
    }
}
