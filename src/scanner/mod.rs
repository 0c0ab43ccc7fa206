//! Scan providers for tagwatch.
//!
//! The registry has no opinion on how devices are discovered. Anything that
//! can turn a bounded scan window into a list of observations implements
//! [`ScanProvider`]. Radio access itself lives outside this crate; the
//! [`FeedScanner`] reads observations written by an external bridge.

pub mod feed;
pub mod noop;
pub mod types;

use std::time::Duration;

// Re-export commonly used types
pub use feed::FeedScanner;
pub use noop::NoopScanner;
pub use types::{Observation, ScanError};

/// A source of device observations.
///
/// Implementations may block for up to `duration`. They are shared between
/// the continuous loop and on-demand scans, hence `Send + Sync`.
pub trait ScanProvider: Send + Sync {
    /// Run one scan window and return every device seen during it.
    fn scan(&self, duration: Duration) -> Result<Vec<Observation>, ScanError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}
