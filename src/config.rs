//! Configuration for tagwatch.

use crate::core::tag::{TagGenerator, DEFAULT_TAG_PREFIX};
use crate::store::CorruptStatePolicy;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Delay between the end of one scan cycle and the start of the next
    #[serde(with = "duration_serde")]
    pub scan_interval: Duration,

    /// Length of each scan window
    #[serde(with = "duration_serde")]
    pub scan_duration: Duration,

    /// Silence after which a present device is marked OUT
    #[serde(with = "duration_serde")]
    pub exit_threshold: Duration,

    /// Prefix for generated tags
    pub tag_prefix: String,

    /// Directory holding the registry and activity files
    pub data_path: PathBuf,

    /// Observation feed written by an external radio bridge
    pub feed_path: Option<PathBuf>,

    /// Handling of an unreadable registry file
    pub on_corrupt_state: CorruptStatePolicy,

    /// IANA timezone used when printing timestamps
    pub display_timezone: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tagwatch");

        Self {
            scan_interval: Duration::from_secs(5),
            scan_duration: Duration::from_secs(4),
            exit_threshold: Duration::from_secs(30),
            tag_prefix: DEFAULT_TAG_PREFIX.to_string(),
            data_path: data_dir,
            feed_path: None,
            on_corrupt_state: CorruptStatePolicy::default(),
            display_timezone: "UTC".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
            let config: Config =
                serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let config_path = Self::config_path();
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tagwatch")
            .join("config.json")
    }

    /// Path of the persisted registry.
    pub fn registry_path(&self) -> PathBuf {
        self.data_path.join("devices.json")
    }

    /// Path of the persisted activity counters.
    pub fn activity_path(&self) -> PathBuf {
        self.data_path.join("activity.json")
    }

    /// Check every value that would otherwise break a running cycle.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scan_settings()?;
        self.tag_generator()?;
        self.timezone()?;
        Ok(())
    }

    pub fn scan_settings(&self) -> Result<ScanSettings, ConfigError> {
        ScanSettings::new(self.scan_duration, self.scan_interval, self.exit_threshold)
    }

    pub fn tag_generator(&self) -> Result<TagGenerator, ConfigError> {
        TagGenerator::new(self.tag_prefix.clone()).map_err(|e| ConfigError::Invalid {
            field: "tag_prefix",
            reason: e.to_string(),
        })
    }

    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.display_timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::Invalid {
                field: "display_timezone",
                reason: e.to_string(),
            })
    }
}

/// Timing parameters for scan cycles, validated on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSettings {
    scan_duration: Duration,
    scan_interval: Duration,
    exit_threshold_secs: u64,
}

impl ScanSettings {
    pub fn new(
        scan_duration: Duration,
        scan_interval: Duration,
        exit_threshold: Duration,
    ) -> Result<Self, ConfigError> {
        if scan_duration.is_zero() {
            return Err(ConfigError::Invalid {
                field: "scan_duration",
                reason: "must be non-zero".to_string(),
            });
        }
        if exit_threshold.as_secs() == 0 {
            return Err(ConfigError::Invalid {
                field: "exit_threshold",
                reason: "must be at least one second".to_string(),
            });
        }
        if exit_threshold.as_secs() > i64::MAX as u64 {
            return Err(ConfigError::Invalid {
                field: "exit_threshold",
                reason: "out of range".to_string(),
            });
        }

        Ok(Self {
            scan_duration,
            scan_interval,
            exit_threshold_secs: exit_threshold.as_secs(),
        })
    }

    pub fn scan_duration(&self) -> Duration {
        self.scan_duration
    }

    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    pub fn exit_threshold_secs(&self) -> u64 {
        self.exit_threshold_secs
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
