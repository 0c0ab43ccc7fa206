//! Activity tracking for tagwatch.
//!
//! Counts what the scanner did so operators can see whether it is healthy
//! without reading the registry itself.

pub mod log;

pub use log::{ActivityLog, ActivityStats, SharedActivityLog};
