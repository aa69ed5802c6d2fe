//! Duration strings such as `30s`, `10m`, `1h30m` or `1.5h`.
//!
//! Only the `s`, `m` and `h` units are accepted, one or more times, each
//! preceded by a non-negative decimal number.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

static DURATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+(\.[0-9]+)?(s|m|h))+$").expect("valid regex"));

static DURATION_COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)(s|m|h)").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("duration {0:?} does not match ^([0-9]+(\\.[0-9]+)?(s|m|h))+$")]
    Malformed(String),

    #[error("duration {0:?} is out of range")]
    OutOfRange(String),
}

/// Parse a duration string into a `Duration`.
pub fn parse_duration(s: &str) -> Result<Duration, DurationError> {
    if !DURATION_PATTERN.is_match(s) {
        return Err(DurationError::Malformed(s.to_string()));
    }

    let mut secs = 0f64;
    for caps in DURATION_COMPONENT.captures_iter(s) {
        let value: f64 = caps[1]
            .parse()
            .map_err(|_| DurationError::Malformed(s.to_string()))?;
        let scale = match &caps[2] {
            "h" => 3600.0,
            "m" => 60.0,
            _ => 1.0,
        };
        secs += value * scale;
    }

    Duration::try_from_secs_f64(secs).map_err(|_| DurationError::OutOfRange(s.to_string()))
}

/// Render a duration in the same notation, e.g. `1h30m` or `45.5s`.
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    let millis = d.subsec_millis();

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if seconds > 0 || millis > 0 || out.is_empty() {
        if millis > 0 {
            let frac = format!("{millis:03}");
            out.push_str(&format!("{seconds}.{}s", frac.trim_end_matches('0')));
        } else {
            out.push_str(&format!("{seconds}s"));
        }
    }
    out
}
