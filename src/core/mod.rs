//! Core presence tracking for tagwatch.

pub mod clock;
pub mod record;
pub mod registry;
pub mod tag;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use record::{DeviceRecord, DeviceView, PresenceState, UNKNOWN_NAME, UNLABELED};
pub use registry::{
    IngestSummary, PresenceRegistry, RegistryError, RegistrySnapshot, SharedRegistry,
};
pub use tag::{generate_tag, InvalidTagPrefix, TagGenerator, DEFAULT_TAG_PREFIX};
