//! Kubernetes-style resource quantities (`512Mi`, `4Gi`, `1.5G`, `1e9`).
//!
//! Only the subset meaningful for memory sizes is accepted: non-negative
//! values, resolved to whole bytes (fractions round up).

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static QUANTITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?([0-9]+(?:\.[0-9]*)?|\.[0-9]+)(Ki|Mi|Gi|Ti|Pi|Ei|m|k|M|G|T|P|E|[eE][+-]?[0-9]+)?$")
        .expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("quantity {0:?} is not a valid non-negative resource quantity")]
    Malformed(String),

    #[error("quantity {0:?} exceeds the supported range")]
    OutOfRange(String),
}

/// A parsed resource quantity. Keeps the original notation for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Quantity {
    raw: String,
    bytes: u64,
}

impl Quantity {
    pub fn parse(s: &str) -> Result<Self, QuantityError> {
        let trimmed = s.trim();
        let caps = QUANTITY_PATTERN
            .captures(trimmed)
            .ok_or_else(|| QuantityError::Malformed(s.to_string()))?;

        let digits = &caps[1];
        let suffix = caps.get(2).map(|m| m.as_str());

        let bytes = match (integer_multiplier(suffix), digits.contains('.')) {
            (Some(multiplier), false) => digits
                .parse::<u64>()
                .ok()
                .and_then(|n| n.checked_mul(multiplier))
                .ok_or_else(|| QuantityError::OutOfRange(s.to_string()))?,
            _ => scaled_bytes(digits, suffix)
                .ok_or_else(|| QuantityError::OutOfRange(s.to_string()))?,
        };

        Ok(Self {
            raw: trimmed.to_string(),
            bytes,
        })
    }

    /// Value in bytes.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Exact multiplier for whole-number suffixes; `None` for milli and
/// exponent notation.
fn integer_multiplier(suffix: Option<&str>) -> Option<u64> {
    let (base, power): (u64, u32) = match suffix {
        None => return Some(1),
        Some("Ki") => (1024, 1),
        Some("Mi") => (1024, 2),
        Some("Gi") => (1024, 3),
        Some("Ti") => (1024, 4),
        Some("Pi") => (1024, 5),
        Some("Ei") => (1024, 6),
        Some("k") => (1000, 1),
        Some("M") => (1000, 2),
        Some("G") => (1000, 3),
        Some("T") => (1000, 4),
        Some("P") => (1000, 5),
        Some("E") => (1000, 6),
        Some(_) => return None,
    };
    base.checked_pow(power)
}

/// Fractional and exponent forms, rounded up to whole bytes.
fn scaled_bytes(digits: &str, suffix: Option<&str>) -> Option<u64> {
    let number: f64 = digits.parse().ok()?;
    let multiplier = match suffix {
        None => 1.0,
        Some("m") => 1e-3,
        Some(exp) if exp.len() > 1 && exp.starts_with(['e', 'E']) => {
            10f64.powi(exp[1..].parse().ok()?)
        }
        Some(other) => integer_multiplier(Some(other))? as f64,
    };
    let value = (number * multiplier).ceil();
    // `u64::MAX as f64` rounds up to 2^64, which does not fit.
    (value.is_finite() && value < u64::MAX as f64).then_some(value as u64)
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Quantity {
    type Error = QuantityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Quantity> for String {
    fn from(q: Quantity) -> Self {
        q.raw
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
