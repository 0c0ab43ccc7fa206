//! tagwatch - presence registry for nearby wireless devices.
//!
//! Each device seen by a scanner gets a stable pseudonymous tag derived from
//! its address, first/last-seen timestamps, and an IN/OUT presence state that
//! flips to OUT after a configurable stretch of silence.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           tagwatch                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌──────────────┐   ┌──────────────────┐   │
//! │  │ ScanProvider│──▶│ Orchestrator │──▶│ PresenceRegistry │   │
//! │  │ (feed/noop) │   │ (cycle/loop) │   │ ingest / sweep   │   │
//! │  └─────────────┘   └──────────────┘   └──────────────────┘   │
//! │                           │                    │              │
//! │                           ▼                    ▼              │
//! │                    ┌─────────────┐     ┌──────────────┐      │
//! │                    │  Activity   │     │ Persistence  │      │
//! │                    │    Log      │     │   Store      │      │
//! │                    └─────────────┘     └──────────────┘      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use tagwatch::core::{PresenceRegistry, PresenceState};
//! use tagwatch::scanner::Observation;
//!
//! let registry = PresenceRegistry::default();
//! registry.ingest(&[Observation::new("AA:BB").with_name("Phone1")], 1000);
//! registry.sweep(1031, 30);
//!
//! let record = registry.get("AA:BB").unwrap();
//! assert_eq!(record.presence_state, PresenceState::Out);
//! assert_eq!(record.exited_at, Some(1031));
//! ```

pub mod activity;
pub mod config;
pub mod core;
pub mod orchestrator;
pub mod scanner;
pub mod store;

// Re-export key types at crate root for convenience
pub use activity::{ActivityLog, ActivityStats, SharedActivityLog};
pub use config::{Config, ConfigError, ScanSettings};
pub use core::{
    generate_tag, DeviceRecord, DeviceView, PresenceRegistry, PresenceState, RegistryError,
    SharedRegistry, TagGenerator,
};
pub use orchestrator::{
    stop_channel, CommandError, CycleError, CycleReport, ScanController, ScanOrchestrator,
    StopHandle, StopSignal,
};
pub use scanner::{FeedScanner, NoopScanner, Observation, ScanError, ScanProvider};
pub use store::{CorruptStatePolicy, PersistenceError, PersistenceStore};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
