//! Device models, telemetry payload sanitizing and the live value cache.

use std::fmt;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::counter::DigitalInput;
use crate::types::Timestamp;

/// Supported hardware models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceModel {
    /// 6 digital inputs, 4 relay outputs, 4 analog inputs.
    Zhc1921,
    /// 4 analog inputs, 2 analog outputs.
    Zhc1661,
    /// 8-channel temperature transmitter.
    Tp4000,
}

impl DeviceModel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "zhc1921" => Some(Self::Zhc1921),
            "zhc1661" => Some(Self::Zhc1661),
            "tp4000" | "tp-4000" => Some(Self::Tp4000),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zhc1921 => "zhc1921",
            Self::Zhc1661 => "zhc1661",
            Self::Tp4000 => "tp4000",
        }
    }

    /// Canonical value keys this model reports.
    pub fn value_keys(self) -> &'static [&'static str] {
        match self {
            Self::Zhc1921 => &[
                "di1", "di2", "di3", "di4", "di5", "di6", "do1", "do2", "do3", "do4", "ai1",
                "ai2", "ai3", "ai4",
            ],
            Self::Zhc1661 => &["ai1", "ai2", "ai3", "ai4", "ao1", "ao2"],
            Self::Tp4000 => &[
                "te101", "te102", "te103", "te104", "te105", "te106", "te107", "te108",
            ],
        }
    }

    /// Map a raw payload key to this model's canonical key, if it has one.
    ///
    /// Digital-input aliases (`in1`..`in6`) resolve through
    /// [`DigitalInput::normalize`].
    pub fn canonical_key(self, raw: &str) -> Option<&'static str> {
        if let Some(input) = DigitalInput::normalize(raw) {
            let key = input.as_str();
            return self.value_keys().contains(&key).then_some(key);
        }
        let lowered = raw.trim().to_ascii_lowercase();
        self.value_keys().iter().copied().find(|k| *k == lowered)
    }

    /// Keep only the keys this model understands, renamed to canonical form.
    pub fn sanitize(self, payload: &Map<String, Value>) -> Map<String, Value> {
        payload
            .iter()
            .filter_map(|(k, v)| self.canonical_key(k).map(|key| (key.to_string(), v.clone())))
            .collect()
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest known values for one device.
#[derive(Debug, Clone, Serialize)]
pub struct LiveSnapshot {
    pub device_id: String,
    pub model: DeviceModel,
    pub last_seen: Timestamp,
    pub values: Map<String, Value>,
}

/// In-process latest-value cache, keyed by device id.
///
/// Writes merge into the existing snapshot (last write wins per key); there
/// is no eviction since the device population is finite.
#[derive(Debug, Default)]
pub struct LiveTelemetryCache {
    devices: DashMap<String, LiveSnapshot>,
}

impl LiveTelemetryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge sanitized `values` into the snapshot for `device_id`.
    pub fn record(
        &self,
        device_id: &str,
        model: DeviceModel,
        values: &Map<String, Value>,
        seen_at: Timestamp,
    ) {
        let device_id = device_id.trim();
        if device_id.is_empty() {
            return;
        }

        let mut entry = self
            .devices
            .entry(device_id.to_string())
            .or_insert_with(|| LiveSnapshot {
                device_id: device_id.to_string(),
                model,
                last_seen: seen_at,
                values: Map::new(),
            });

        entry.model = model;
        if seen_at > entry.last_seen {
            entry.last_seen = seen_at;
        }
        for (k, v) in values {
            entry.values.insert(k.clone(), v.clone());
        }
    }

    pub fn get(&self, device_id: &str) -> Option<LiveSnapshot> {
        self.devices.get(device_id.trim()).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
