//! Configuration errors.

use thiserror::Error;

use crate::duration::DurationError;
use crate::quantity::QuantityError;

/// Result type alias for configuration loading and validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Reasons a sizing configuration cannot be read or accepted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("configuration must be named 'cluster', got {0:?}")]
    InvalidName(String),

    #[error("size class names must not be empty")]
    EmptySizeName,

    #[error("size class {0:?} is defined more than once")]
    DuplicateSizeName(String),

    #[error("size class {name:?}: lower limit {from} must be less than or equal to the upper limit {to}")]
    InvertedRange { name: String, from: u32, to: u32 },

    #[error("exactly one size class must have a lower limit of zero, found none")]
    MissingZeroLowerBound,

    #[error("exactly one size class must have a lower limit of zero, found {0:?}")]
    MultipleZeroLowerBound(Vec<String>),

    #[error("exactly one size class must have no upper limit, found none")]
    MissingOpenUpperBound,

    #[error("exactly one size class must have no upper limit, found {0:?}")]
    MultipleOpenUpperBound(Vec<String>),

    #[error("node counts {start}..={end} are not covered between size classes {before:?} and {after:?}")]
    Gap {
        before: String,
        after: String,
        start: u32,
        end: u32,
    },

    #[error("size classes {first:?} and {second:?} overlap starting at node count {at}")]
    Overlap {
        first: String,
        second: String,
        at: u32,
    },

    #[error("{field}: {source}")]
    InvalidDuration {
        field: &'static str,
        #[source]
        source: DurationError,
    },

    #[error("concurrency.limit must be at least 1, got {0}")]
    InvalidLimit(i64),

    #[error("size class {size:?} {field}: {source}")]
    InvalidQuantity {
        size: String,
        field: &'static str,
        #[source]
        source: QuantityError,
    },
}

impl ConfigError {
    /// Status condition reason for this error.
    pub fn reason(&self) -> &'static str {
        match self {
            ConfigError::Read(_) | ConfigError::Parse(_) => "ConfigurationUnreadable",
            _ => "ConfigurationInvalid",
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}
