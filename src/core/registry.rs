//! The presence registry: one record per address, and the IN/OUT state machine.
//!
//! Every operation takes the registry lock for its own duration only. Scans
//! run outside the lock, so a slow radio never blocks labeling or display.

use crate::core::record::{DeviceRecord, DeviceView, PresenceState, UNKNOWN_NAME};
use crate::core::tag::TagGenerator;
use crate::scanner::Observation;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Registry contents keyed by address. This is the unit of persistence.
pub type RegistrySnapshot = BTreeMap<String, DeviceRecord>;

const LEGACY_UNKNOWN_NAME: &str = "-";

/// Errors from registry mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("no device with address or tag {0:?}")]
    NotFound(String),
}

/// Outcome of one ingestion batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Addresses seen for the first time
    pub created: usize,
    /// Known addresses refreshed
    pub refreshed: usize,
    /// Observations dropped for having no address
    pub skipped: usize,
}

impl IngestSummary {
    pub fn ingested(&self) -> usize {
        self.created + self.refreshed
    }
}

/// In-memory registry of tracked devices.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    devices: Mutex<RegistrySnapshot>,
    tags: TagGenerator,
}

impl PresenceRegistry {
    /// Create an empty registry.
    pub fn new(tags: TagGenerator) -> Self {
        Self {
            devices: Mutex::new(BTreeMap::new()),
            tags,
        }
    }

    /// Create a registry from a persisted snapshot.
    ///
    /// Records are re-keyed by their map key, and any record missing a tag
    /// gets one derived from its address. Older files wrote `"-"` for a
    /// device that never advertised a name.
    pub fn from_snapshot(tags: TagGenerator, snapshot: RegistrySnapshot) -> Self {
        let devices = snapshot
            .into_iter()
            .map(|(address, mut record)| {
                record.address = address.clone();
                if record.tag.is_empty() {
                    record.tag = tags.generate(&address);
                }
                if matches!(record.observed_name.as_str(), "" | LEGACY_UNKNOWN_NAME) {
                    record.observed_name = UNKNOWN_NAME.to_string();
                }
                (address, record)
            })
            .collect();

        Self {
            devices: Mutex::new(devices),
            tags,
        }
    }

    pub fn tag_generator(&self) -> &TagGenerator {
        &self.tags
    }

    /// Lock the map. Each operation leaves the map consistent, so a poisoned
    /// lock is safe to reuse.
    fn devices(&self) -> MutexGuard<'_, RegistrySnapshot> {
        self.devices.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a batch of observations, all stamped with the same `now`.
    pub fn ingest(&self, observations: &[Observation], now: i64) -> IngestSummary {
        let mut summary = IngestSummary::default();
        let mut devices = self.devices();

        for obs in observations {
            let address = obs.address.as_str();
            if address.trim().is_empty() {
                warn!("Ignoring observation without an address");
                summary.skipped += 1;
                continue;
            }

            match devices.get_mut(address) {
                Some(record) => {
                    if record.presence_state == PresenceState::Out {
                        debug!(tag = %record.tag, "Device re-entered");
                    }
                    record.last_seen_at = record.last_seen_at.max(now);
                    record.signal_strength = obs.signal_strength;
                    record.presence_state = PresenceState::In;
                    record.exited_at = None;
                    record.observation_count += 1;
                    if let Some(name) = obs.reported_name() {
                        record.observed_name = name.to_string();
                    }
                    summary.refreshed += 1;
                }
                None => {
                    let tag = self.tags.generate(address);
                    debug!(%tag, "New device");
                    devices.insert(
                        address.to_string(),
                        DeviceRecord::new(
                            address,
                            tag,
                            obs.reported_name(),
                            obs.signal_strength,
                            now,
                        ),
                    );
                    summary.created += 1;
                }
            }
        }

        summary
    }

    /// Mark every present device silent for longer than `exit_threshold_secs` as OUT.
    ///
    /// Returns the number of devices that exited. Devices already OUT are
    /// untouched, so repeated sweeps never move `exited_at`.
    pub fn sweep(&self, now: i64, exit_threshold_secs: u64) -> usize {
        let threshold = i64::try_from(exit_threshold_secs).unwrap_or(i64::MAX);
        let mut exited = 0;

        for record in self.devices().values_mut() {
            if record.presence_state == PresenceState::In
                && now.saturating_sub(record.last_seen_at) > threshold
            {
                record.presence_state = PresenceState::Out;
                record.exited_at = Some(now);
                debug!(tag = %record.tag, "Device exited");
                exited += 1;
            }
        }

        exited
    }

    /// Set the custom label for `address`. An empty label clears it.
    pub fn label(&self, address: &str, label: &str) -> Result<(), RegistryError> {
        let mut devices = self.devices();
        let record = devices
            .get_mut(address)
            .ok_or_else(|| RegistryError::NotFound(address.to_string()))?;
        record.custom_label = label.to_string();
        Ok(())
    }

    /// Find the address for an address or a displayed tag.
    pub fn resolve(&self, address_or_tag: &str) -> Option<String> {
        let devices = self.devices();
        if devices.contains_key(address_or_tag) {
            return Some(address_or_tag.to_string());
        }
        devices
            .values()
            .find(|record| record.tag.eq_ignore_ascii_case(address_or_tag))
            .map(|record| record.address.clone())
    }

    /// Remove every record. Returns how many were dropped.
    pub fn reset(&self) -> usize {
        let mut devices = self.devices();
        let dropped = devices.len();
        devices.clear();
        dropped
    }

    /// Display views ordered by first sighting, then address.
    pub fn snapshot(&self, now: i64) -> Vec<DeviceView> {
        let devices = self.devices();
        let mut records: Vec<&DeviceRecord> = devices.values().collect();
        records.sort_by(|a, b| {
            a.first_seen_at
                .cmp(&b.first_seen_at)
                .then_with(|| a.address.cmp(&b.address))
        });
        records.into_iter().map(|r| r.view(now)).collect()
    }

    /// A copy of the full contents, for persistence.
    pub fn records(&self) -> RegistrySnapshot {
        self.devices().clone()
    }

    pub fn get(&self, address: &str) -> Option<DeviceRecord> {
        self.devices().get(address).cloned()
    }

    /// Number of devices currently IN and OUT.
    pub fn counts(&self) -> (usize, usize) {
        let devices = self.devices();
        let present = devices.values().filter(|r| r.is_present()).count();
        (present, devices.len() - present)
    }

    pub fn len(&self) -> usize {
        self.devices().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices().is_empty()
    }
}

/// Thread-safe shared registry.
pub type SharedRegistry = Arc<PresenceRegistry>;
