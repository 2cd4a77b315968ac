//! Output fields, control widget types and actuation lock keys.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default absolute lifetime of an actuation lock.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(10);

/// One of the four digital-output relays a control widget can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputField {
    Do1,
    Do2,
    Do3,
    Do4,
}

impl OutputField {
    /// Parse a raw field name (`do1`..`do4`, case-insensitive).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "do1" => Some(Self::Do1),
            "do2" => Some(Self::Do2),
            "do3" => Some(Self::Do3),
            "do4" => Some(Self::Do4),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Do1 => "do1",
            Self::Do2 => "do2",
            Self::Do3 => "do3",
            Self::Do4 => "do4",
        }
    }

    /// 1-based relay index used on the gateway wire.
    pub fn index(self) -> u8 {
        match self {
            Self::Do1 => 1,
            Self::Do2 => 2,
            Self::Do3 => 3,
            Self::Do4 => 4,
        }
    }
}

impl fmt::Display for OutputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Widget kinds allowed to drive an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlWidgetType {
    Toggle,
    PushNo,
    PushNc,
}

impl ControlWidgetType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "toggle" => Some(Self::Toggle),
            "push_no" => Some(Self::PushNo),
            "push_nc" => Some(Self::PushNc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Toggle => "toggle",
            Self::PushNo => "push_no",
            Self::PushNc => "push_nc",
        }
    }
}

/// Canonical identity of an actuation lock: one per (device, output).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey {
    device_id: String,
    field: OutputField,
}

impl LockKey {
    pub fn new(device_id: &str, field: OutputField) -> Self {
        Self {
            device_id: device_id.trim().to_string(),
            field,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn field(&self) -> OutputField {
        self.field
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device_id, self.field)
    }
}
