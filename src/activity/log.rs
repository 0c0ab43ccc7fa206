//! Scan activity counters.
//!
//! Tracks what the scanner has been doing across runs: cycles, failures,
//! observations and presence changes. Only counts are kept, never addresses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Activity counters for the current process, optionally persisted.
#[derive(Debug)]
pub struct ActivityLog {
    /// Scan cycles that completed ingestion
    cycles_completed: AtomicU64,
    /// Scans that failed and were skipped
    scans_failed: AtomicU64,
    /// Observations ingested into the registry
    observations_ingested: AtomicU64,
    /// Addresses seen for the first time
    devices_discovered: AtomicU64,
    /// IN to OUT transitions recorded by sweeps
    exits_recorded: AtomicU64,
    /// Registry saves that failed
    saves_failed: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self {
            cycles_completed: AtomicU64::new(0),
            scans_failed: AtomicU64::new(0),
            observations_ingested: AtomicU64::new(0),
            devices_discovered: AtomicU64::new(0),
            exits_recorded: AtomicU64::new(0),
            saves_failed: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create an activity log that resumes from, and saves to, `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            warn!("Could not load previous activity stats: {e}");
        }

        log
    }

    pub fn record_cycle(&self, observations: u64, discovered: u64, exits: u64) {
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        self.observations_ingested
            .fetch_add(observations, Ordering::Relaxed);
        self.devices_discovered
            .fetch_add(discovered, Ordering::Relaxed);
        self.exits_recorded.fetch_add(exits, Ordering::Relaxed);
    }

    pub fn record_scan_failure(&self) {
        self.scans_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_save_failure(&self) {
        self.saves_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> ActivityStats {
        ActivityStats {
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            scans_failed: self.scans_failed.load(Ordering::Relaxed),
            observations_ingested: self.observations_ingested.load(Ordering::Relaxed),
            devices_discovered: self.devices_discovered.load(Ordering::Relaxed),
            exits_recorded: self.exits_recorded.load(Ordering::Relaxed),
            saves_failed: self.saves_failed.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Scan Activity:\n\
             - Cycles completed: {}\n\
             - Scans failed: {}\n\
             - Observations ingested: {}\n\
             - Devices discovered: {}\n\
             - Exits recorded: {}\n\
             - Saves failed: {}\n\
             - Session duration: {} seconds",
            stats.cycles_completed,
            stats.scans_failed,
            stats.observations_ingested,
            stats.devices_discovered,
            stats.exits_recorded,
            stats.saves_failed,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedActivity {
                cycles_completed: stats.cycles_completed,
                scans_failed: stats.scans_failed,
                observations_ingested: stats.observations_ingested,
                devices_discovered: stats.devices_discovered,
                exits_recorded: stats.exits_recorded,
                saves_failed: stats.saves_failed,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedActivity =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.cycles_completed
                    .store(persisted.cycles_completed, Ordering::Relaxed);
                self.scans_failed
                    .store(persisted.scans_failed, Ordering::Relaxed);
                self.observations_ingested
                    .store(persisted.observations_ingested, Ordering::Relaxed);
                self.devices_discovered
                    .store(persisted.devices_discovered, Ordering::Relaxed);
                self.exits_recorded
                    .store(persisted.exits_recorded, Ordering::Relaxed);
                self.saves_failed
                    .store(persisted.saves_failed, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.cycles_completed.store(0, Ordering::Relaxed);
        self.scans_failed.store(0, Ordering::Relaxed);
        self.observations_ingested.store(0, Ordering::Relaxed);
        self.devices_discovered.store(0, Ordering::Relaxed);
        self.exits_recorded.store(0, Ordering::Relaxed);
        self.saves_failed.store(0, Ordering::Relaxed);
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of activity statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityStats {
    pub cycles_completed: u64,
    pub scans_failed: u64,
    pub observations_ingested: u64,
    pub devices_discovered: u64,
    pub exits_recorded: u64,
    pub saves_failed: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedActivity {
    cycles_completed: u64,
    scans_failed: u64,
    observations_ingested: u64,
    devices_discovered: u64,
    exits_recorded: u64,
    saves_failed: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared activity log.
pub type SharedActivityLog = Arc<ActivityLog>;
