//! Counter binding vocabulary: digital-input slots, signal levels and
//! dashboard scoping.
//!
//! Field names arrive from widgets and older firmware in several spellings
//! (`di3`, `DI3`, legacy `in3`). They are normalized here, once, into
//! [`DigitalInput`]; every other layer works with the enum.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder field assigned to a counter before the user binds it.
pub const DEFAULT_COUNTER_FIELD: DigitalInput = DigitalInput::Di1;

/// Dashboard id alias that refers to the tenant's main dashboard.
pub const MAIN_DASHBOARD_ALIAS: &str = "main";

// ---------------------------------------------------------------------------
// Digital inputs
// ---------------------------------------------------------------------------

/// One of the six digital-input slots a counter can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigitalInput {
    Di1,
    Di2,
    Di3,
    Di4,
    Di5,
    Di6,
}

impl DigitalInput {
    pub const ALL: [DigitalInput; 6] = [
        DigitalInput::Di1,
        DigitalInput::Di2,
        DigitalInput::Di3,
        DigitalInput::Di4,
        DigitalInput::Di5,
        DigitalInput::Di6,
    ];

    /// Normalize a raw field name into a canonical input slot.
    ///
    /// Accepts `di1..di6` and the legacy `in1..in6`, case-insensitively and
    /// ignoring surrounding whitespace. Anything else yields `None`.
    pub fn normalize(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_ascii_lowercase();
        let digit = lowered
            .strip_prefix("di")
            .or_else(|| lowered.strip_prefix("in"))?;

        match digit {
            "1" => Some(Self::Di1),
            "2" => Some(Self::Di2),
            "3" => Some(Self::Di3),
            "4" => Some(Self::Di4),
            "5" => Some(Self::Di5),
            "6" => Some(Self::Di6),
            _ => None,
        }
    }

    /// Canonical column / JSON key name (`di1`..`di6`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Di1 => "di1",
            Self::Di2 => "di2",
            Self::Di3 => "di3",
            Self::Di4 => "di4",
            Self::Di5 => "di5",
            Self::Di6 => "di6",
        }
    }
}

impl fmt::Display for DigitalInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether binding a counter to (`new_device`, `new_field`) changes what it
/// tracks. A rebinding resets accumulated count and run-time.
pub fn is_rebinding(
    old_device: &str,
    old_field: &str,
    new_device: &str,
    new_field: DigitalInput,
) -> bool {
    old_device.trim() != new_device.trim() || DigitalInput::normalize(old_field) != Some(new_field)
}

// ---------------------------------------------------------------------------
// Signal level
// ---------------------------------------------------------------------------

/// Observed state of a digital input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Coerce a telemetry value into a level.
    ///
    /// Booleans map directly, numbers are high when positive, and strings
    /// accept `1/true/on/yes` and `0/false/off/no` before falling back to a
    /// numeric parse and finally to "non-empty means high". `null` carries
    /// no information and yields `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::from_bool(*b)),
            Value::Number(n) => Some(Self::from_bool(n.as_f64().is_some_and(|f| f > 0.0))),
            Value::String(s) => Some(Self::from_text(s)),
            Value::Array(items) => Some(Self::from_bool(!items.is_empty())),
            Value::Object(map) => Some(Self::from_bool(!map.is_empty())),
        }
    }

    fn from_text(raw: &str) -> Self {
        let s = raw.trim().to_ascii_lowercase();
        match s.as_str() {
            "1" | "true" | "on" | "yes" => Self::High,
            "0" | "false" | "off" | "no" | "" => Self::Low,
            other => match other.parse::<f64>() {
                Ok(n) => Self::from_bool(n > 0.0),
                Err(_) => Self::High,
            },
        }
    }

    pub fn from_bool(high: bool) -> Self {
        if high {
            Self::High
        } else {
            Self::Low
        }
    }

    /// Stored representation (`prev_level` column).
    pub fn as_i16(self) -> i16 {
        match self {
            Self::Low => 0,
            Self::High => 1,
        }
    }

    /// Inverse of [`Level::as_i16`]; any non-zero value counts as high.
    pub fn from_i16(raw: i16) -> Self {
        Self::from_bool(raw != 0)
    }
}

// ---------------------------------------------------------------------------
// Dashboard scoping
// ---------------------------------------------------------------------------

/// Normalize a dashboard id for storage.
///
/// Blank values and the `main` alias refer to the main dashboard, which is
/// stored as `NULL`. Everything else is kept trimmed.
pub fn normalize_dashboard_id(raw: Option<&str>) -> Option<String> {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(MAIN_DASHBOARD_ALIAS) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Which dashboards a counter lookup may match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardScope {
    /// No dashboard filter at all.
    Any,
    /// The tenant's main dashboard (`dashboard_id IS NULL`).
    Main,
    /// A named dashboard.
    Named(String),
}

impl DashboardScope {
    /// Build a scope from an optional query/body parameter.
    ///
    /// An absent parameter matches any dashboard; a present one is
    /// normalized with [`normalize_dashboard_id`].
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw {
            None => Self::Any,
            Some(value) => match normalize_dashboard_id(Some(value)) {
                None => Self::Main,
                Some(id) => Self::Named(id),
            },
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Stored dashboard id this scope pins, `None` for main or any.
    pub fn dashboard_id(&self) -> Option<&str> {
        match self {
            Self::Named(id) => Some(id.as_str()),
            Self::Any | Self::Main => None,
        }
    }
}
