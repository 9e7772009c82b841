use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Tunable parameters of the reel
///
/// Values held here are always sanitized: the duration never drops below
/// [`ReelConfig::MIN_DURATION_MS`] and the other fields are non-negative by
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReelConfig {
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    #[serde(rename = "jitter")]
    pub jitter_ms: u64,
    #[serde(rename = "historySize")]
    pub history_size: usize,
}

impl ReelConfig {
    pub const MIN_DURATION_MS: u64 = 1500;
    pub const DEFAULT_DURATION_MS: u64 = 5000;
    pub const DEFAULT_JITTER_MS: u64 = 200;
    pub const DEFAULT_HISTORY_SIZE: usize = 12;

    /// Builds a config from a loosely-typed JSON record
    ///
    /// Each field is sanitized on its own; a missing or malformed field
    /// takes its default while the others are kept.
    pub fn from_json(value: &Value) -> Self {
        let defaults = Self::default();
        Self {
            duration_ms: sanitize_duration_ms(
                RawNumber::from_json(value.get("durationMs")),
                defaults.duration_ms,
            ),
            jitter_ms: sanitize_jitter_ms(
                RawNumber::from_json(value.get("jitter")),
                defaults.jitter_ms,
            ),
            history_size: sanitize_history_size(
                RawNumber::from_json(value.get("historySize")),
                defaults.history_size,
            ),
        }
    }

    /// Current value of `field` rendered for an input buffer
    pub fn field_text(&self, field: ConfigField) -> String {
        match field {
            ConfigField::Duration => self.duration_ms.to_string(),
            ConfigField::Jitter => self.jitter_ms.to_string(),
            ConfigField::HistorySize => self.history_size.to_string(),
        }
    }

    /// Sanitizes `raw` for `field` and stores it
    ///
    /// Parse failures fall back to the field's default, never to the
    /// previous value.
    pub fn apply_field(&mut self, field: ConfigField, raw: &str) {
        let defaults = Self::default();
        match field {
            ConfigField::Duration => {
                self.duration_ms = sanitize_duration_ms(raw, defaults.duration_ms);
            }
            ConfigField::Jitter => {
                self.jitter_ms = sanitize_jitter_ms(raw, defaults.jitter_ms);
            }
            ConfigField::HistorySize => {
                self.history_size = sanitize_history_size(raw, defaults.history_size);
            }
        }
    }
}

impl Default for ReelConfig {
    fn default() -> Self {
        Self {
            duration_ms: Self::DEFAULT_DURATION_MS,
            jitter_ms: Self::DEFAULT_JITTER_MS,
            history_size: Self::DEFAULT_HISTORY_SIZE,
        }
    }
}

/// Editable config fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigField {
    Duration,
    Jitter,
    HistorySize,
}

impl ConfigField {
    pub const ALL: [ConfigField; 3] = [
        ConfigField::Duration,
        ConfigField::Jitter,
        ConfigField::HistorySize,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ConfigField::Duration => "duration",
            ConfigField::Jitter => "jitter",
            ConfigField::HistorySize => "history-size",
        }
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown config field {0:?} (expected duration, jitter or history-size)")]
pub struct UnknownField(pub String);

impl FromStr for ConfigField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "duration" | "duration-ms" | "durationms" => Ok(ConfigField::Duration),
            "jitter" | "jitter-ms" | "jitterms" => Ok(ConfigField::Jitter),
            "history-size" | "history_size" | "historysize" => Ok(ConfigField::HistorySize),
            other => Err(UnknownField(other.to_string())),
        }
    }
}

/// A value that should be numeric but arrives untyped
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawNumber<'a> {
    Text(&'a str),
    /// A non-negative integer, kept exact
    Whole(u64),
    Number(f64),
    Missing,
}

impl<'a> RawNumber<'a> {
    /// Classifies a JSON field; anything but a number or a string is missing
    pub fn from_json(value: Option<&'a Value>) -> Self {
        match value {
            Some(Value::Number(n)) => match n.as_u64() {
                Some(whole) => RawNumber::Whole(whole),
                None => n.as_f64().map_or(RawNumber::Missing, RawNumber::Number),
            },
            Some(Value::String(s)) => RawNumber::Text(s),
            _ => RawNumber::Missing,
        }
    }

    /// Numeric reading of the value, NaN when it cannot be read
    ///
    /// Text is trimmed first and empty text reads as zero.
    pub fn to_f64(self) -> f64 {
        match self {
            RawNumber::Whole(n) => n as f64,
            RawNumber::Number(n) => n,
            RawNumber::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            RawNumber::Missing => f64::NAN,
        }
    }
}

impl<'a> From<&'a str> for RawNumber<'a> {
    fn from(value: &'a str) -> Self {
        RawNumber::Text(value)
    }
}

/// Floors `raw` and raises it to `lower`, saturating at `u64::MAX`
///
/// Whole numbers, including integer text, skip the float path so values
/// above 2^53 survive unchanged.
fn floor_at_least(raw: RawNumber<'_>, lower: u64) -> Option<u64> {
    let whole = match raw {
        RawNumber::Whole(n) => Some(n),
        RawNumber::Text(s) => s.trim().parse::<u64>().ok(),
        RawNumber::Number(_) | RawNumber::Missing => None,
    };
    if let Some(n) = whole {
        return Some(n.max(lower));
    }

    let n = raw.to_f64();
    if !n.is_finite() {
        return None;
    }
    Some(n.floor().max(lower as f64) as u64)
}

/// `max(1500, floor(raw))`, or `fallback` when `raw` is not a finite number
pub fn sanitize_duration_ms<'a>(raw: impl Into<RawNumber<'a>>, fallback: u64) -> u64 {
    floor_at_least(raw.into(), ReelConfig::MIN_DURATION_MS).unwrap_or(fallback)
}

/// `max(0, floor(raw))`, or `fallback` when `raw` is not a finite number
pub fn sanitize_jitter_ms<'a>(raw: impl Into<RawNumber<'a>>, fallback: u64) -> u64 {
    floor_at_least(raw.into(), 0).unwrap_or(fallback)
}

/// `max(0, floor(raw))`, or `fallback` when `raw` is not a finite number
pub fn sanitize_history_size<'a>(raw: impl Into<RawNumber<'a>>, fallback: usize) -> usize {
    floor_at_least(raw.into(), 0).map_or(fallback, |n| usize::try_from(n).unwrap_or(usize::MAX))
}
