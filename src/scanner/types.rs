//! Observation and error types shared by every scan provider.
//!
//! An observation carries only what the registry needs: the device address,
//! the advertised name if any, and the signal strength if reported.

use serde::{Deserialize, Serialize};

/// A single sighting of a device within one scan cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Hardware or network address of the device
    pub address: String,
    /// Advertised name, if the device reported one
    #[serde(default)]
    pub name: Option<String>,
    /// Received signal strength, if reported
    #[serde(default, alias = "rssi")]
    pub signal_strength: Option<i32>,
}

impl Observation {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
            signal_strength: None,
        }
    }

    /// Attach an advertised name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach a signal strength reading.
    pub fn with_signal(mut self, signal_strength: i32) -> Self {
        self.signal_strength = Some(signal_strength);
        self
    }

    /// The advertised name, treating blank names as absent.
    pub fn reported_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// Errors reported by a scan provider. A failed scan never reaches the registry.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("scanner unavailable: {0}")]
    Unavailable(String),

    #[error("malformed scan output: {0}")]
    Malformed(String),

    #[error("scan failed: {0}")]
    Failed(String),

    #[error("scan I/O error: {0}")]
    Io(#[from] std::io::Error),
}
