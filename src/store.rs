//! Durable storage for the registry.
//!
//! The whole registry is written as one pretty-printed JSON object mapping
//! address to record. Saves go to a temporary sibling file that is renamed
//! over the real one, so a crash mid-write leaves the previous snapshot in
//! place.

use crate::core::RegistrySnapshot;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// What to do when the registry file exists but cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptStatePolicy {
    /// Move the unreadable file aside and start with an empty registry.
    #[default]
    Reset,
    /// Refuse to load.
    Fail,
}

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("registry file {} is corrupt: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize registry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Loads and saves full registry snapshots at a fixed path.
#[derive(Debug, Clone)]
pub struct PersistenceStore {
    path: PathBuf,
    policy: CorruptStatePolicy,
}

impl PersistenceStore {
    pub fn new(path: impl Into<PathBuf>, policy: CorruptStatePolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> CorruptStatePolicy {
        self.policy
    }

    /// Where an unreadable registry file is moved under [`CorruptStatePolicy::Reset`].
    ///
    /// Each call picks a fresh `devices.json.corrupt-<timestamp>` name, so
    /// earlier quarantined copies are never overwritten.
    pub fn quarantine_path(&self) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f").to_string();
        let mut candidate = sibling_with_suffix(&self.path, &format!("corrupt-{stamp}"));
        let mut attempt = 1;
        while candidate.exists() {
            candidate = sibling_with_suffix(&self.path, &format!("corrupt-{stamp}-{attempt}"));
            attempt += 1;
        }
        candidate
    }

    fn temp_path(&self) -> PathBuf {
        sibling_with_suffix(&self.path, "tmp")
    }

    /// Load the stored snapshot. A missing file is an empty registry.
    pub fn load(&self) -> Result<RegistrySnapshot, PersistenceError> {
        if !self.path.exists() {
            return Ok(RegistrySnapshot::new());
        }

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(source) => {
                return match self.policy {
                    CorruptStatePolicy::Reset => {
                        warn!(
                            "Could not read {}, starting with an empty registry: {source}",
                            self.path.display()
                        );
                        Ok(RegistrySnapshot::new())
                    }
                    CorruptStatePolicy::Fail => Err(PersistenceError::Read {
                        path: self.path.clone(),
                        source,
                    }),
                };
            }
        };

        match serde_json::from_str::<RegistrySnapshot>(&content) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => match self.policy {
                CorruptStatePolicy::Reset => {
                    let quarantine = self.quarantine_path();
                    warn!(
                        "Registry file {} is corrupt ({e}), moving it to {} and starting empty",
                        self.path.display(),
                        quarantine.display()
                    );
                    if let Err(rename_err) = std::fs::rename(&self.path, &quarantine) {
                        warn!("Could not move corrupt registry aside: {rename_err}");
                    }
                    Ok(RegistrySnapshot::new())
                }
                CorruptStatePolicy::Fail => Err(PersistenceError::Corrupt {
                    path: self.path.clone(),
                    reason: e.to_string(),
                }),
            },
        }
    }

    /// Overwrite the stored snapshot with `snapshot`.
    pub fn save(&self, snapshot: &RegistrySnapshot) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| PersistenceError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let temp_path = self.temp_path();
        let result = write_synced(&temp_path, json.as_bytes())
            .and_then(|()| std::fs::rename(&temp_path, &self.path));

        result.map_err(|source| {
            let _ = std::fs::remove_file(&temp_path);
            PersistenceError::Write {
                path: self.path.clone(),
                source,
            }
        })
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// `devices.json` -> `devices.json.<suffix>`
fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
