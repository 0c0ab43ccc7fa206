//! The per-device record and its read-only display view.

use serde::{Deserialize, Serialize};

/// Name shown for devices that never advertised one.
pub const UNKNOWN_NAME: &str = "unknown";

/// Label shown for devices without a custom label.
pub const UNLABELED: &str = "unlabeled";

/// Binary presence classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PresenceState {
    #[default]
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
}

impl std::fmt::Display for PresenceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PresenceState::In => f.pad("IN"),
            PresenceState::Out => f.pad("OUT"),
        }
    }
}

/// Everything the registry knows about one address.
///
/// Older registry files used different field names; the aliases let them
/// load unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Map key; never changes once created
    #[serde(default)]
    pub address: String,
    /// Derived from the address at first sighting
    #[serde(default)]
    pub tag: String,
    /// Last non-empty advertised name
    #[serde(default = "unknown_name", alias = "ble_name")]
    pub observed_name: String,
    /// Operator-assigned label; empty means unlabeled
    #[serde(default, alias = "custom_name")]
    pub custom_label: String,
    /// Signal strength from the most recent sighting
    #[serde(default, alias = "rssi")]
    pub signal_strength: Option<i32>,
    #[serde(default, alias = "first_seen")]
    pub first_seen_at: i64,
    #[serde(default, alias = "last_seen")]
    pub last_seen_at: i64,
    #[serde(default, alias = "seen_count")]
    pub observation_count: u64,
    #[serde(default, alias = "status")]
    pub presence_state: PresenceState,
    /// Set on the IN to OUT transition only
    #[serde(default, alias = "out_time", skip_serializing_if = "Option::is_none")]
    pub exited_at: Option<i64>,
}

fn unknown_name() -> String {
    UNKNOWN_NAME.to_string()
}

impl DeviceRecord {
    /// A freshly sighted device.
    pub fn new(
        address: impl Into<String>,
        tag: impl Into<String>,
        name: Option<&str>,
        signal_strength: Option<i32>,
        now: i64,
    ) -> Self {
        Self {
            address: address.into(),
            tag: tag.into(),
            observed_name: name.map(str::to_string).unwrap_or_else(unknown_name),
            custom_label: String::new(),
            signal_strength,
            first_seen_at: now,
            last_seen_at: now,
            observation_count: 1,
            presence_state: PresenceState::In,
            exited_at: None,
        }
    }

    /// `customLabel` if set, otherwise the unlabeled sentinel.
    pub fn display_label(&self) -> &str {
        if self.custom_label.is_empty() {
            UNLABELED
        } else {
            &self.custom_label
        }
    }

    /// Seconds of silence as of `now`, never negative.
    pub fn silence_secs(&self, now: i64) -> u64 {
        now.saturating_sub(self.last_seen_at).max(0) as u64
    }

    pub fn is_present(&self) -> bool {
        self.presence_state == PresenceState::In
    }

    pub fn view(&self, now: i64) -> DeviceView {
        DeviceView {
            tag: self.tag.clone(),
            observed_name: self.observed_name.clone(),
            display_label: self.display_label().to_string(),
            address: self.address.clone(),
            signal_strength: self.signal_strength,
            presence_state: self.presence_state,
            seconds_since_last_seen: self.silence_secs(now),
            first_seen_at: self.first_seen_at,
            last_seen_at: self.last_seen_at,
            observation_count: self.observation_count,
        }
    }
}

/// Read-only projection handed to display code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceView {
    pub tag: String,
    pub observed_name: String,
    pub display_label: String,
    pub address: String,
    pub signal_strength: Option<i32>,
    pub presence_state: PresenceState,
    pub seconds_since_last_seen: u64,
    pub first_seen_at: i64,
    pub last_seen_at: i64,
    pub observation_count: u64,
}
